//! JSON command manifests and the handler factories they bind to.
//!
//! A module's `commands/` folder holds one manifest per command. The manifest
//! carries metadata; behavior comes from a handler factory registered in code
//! under the manifest's `handler` identity (default: the file stem).
//!
//! ```json
//! {
//!     "handler": "ping",
//!     "aliases": ["p"],
//!     "args": [{ "name": "target", "type": "user", "optional": true }],
//!     "cooldown": 5,
//!     "mode": "any"
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cog_core::Permissions;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, trace};

use super::args::{ArgKind, ArgumentSpec, Choice};
use super::definition::{Command, CommandDefinition, TriggerMode};
use crate::error::{CatalogError, CatalogResult};

/// Builds a fresh definition for a manifest.
pub type HandlerFactory = Arc<dyn Fn() -> anyhow::Result<CommandDefinition> + Send + Sync>;

/// Handler factories by identity. Cloning shares the table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: Arc<RwLock<HashMap<String, HandlerFactory>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. Last registration wins.
    pub fn register<F>(&self, identity: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<CommandDefinition> + Send + Sync + 'static,
    {
        let identity = identity.into();
        debug!(handler = %identity, "Registered command handler");
        self.factories.write().insert(identity, Arc::new(factory));
    }

    /// Registers a `Default` command type under `identity`, also used as its name.
    pub fn register_default<C: Command + Default>(&self, identity: impl Into<String>) {
        let identity = identity.into();
        let name = identity.clone();
        self.register(identity, move || {
            Ok(CommandDefinition::from_handler(name.clone(), Arc::new(C::default())))
        });
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.factories.read().contains_key(identity)
    }

    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Instantiates the handler registered as `identity`.
    pub fn build(&self, identity: &str, manifest_path: &Path) -> CatalogResult<CommandDefinition> {
        let factory = self
            .factories
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownHandler {
                path: manifest_path.to_path_buf(),
                handler: identity.to_string(),
            })?;
        factory().map_err(|source| CatalogError::HandlerFailed {
            handler: identity.to_string(),
            source,
        })
    }
}

/// One entry of a manifest's `args`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArgKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

impl From<ArgumentManifest> for ArgumentSpec {
    fn from(manifest: ArgumentManifest) -> Self {
        let mut spec = ArgumentSpec::new(manifest.name, manifest.kind);
        if manifest.optional {
            spec = spec.optional();
        }
        if let Some(choices) = manifest.choices {
            spec = spec.choices(choices);
        }
        spec
    }
}

/// Command metadata read from a JSON file. Absent fields keep the
/// handler's own values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandManifest {
    pub handler: Option<String>,
    pub name: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub examples: Option<Vec<String>>,
    pub description: Option<String>,
    pub args: Option<Vec<ArgumentManifest>>,
    pub admin_only: Option<bool>,
    pub nsfw: Option<bool>,
    pub dm: Option<bool>,
    pub permissions: Option<Permissions>,
    /// Seconds.
    pub cooldown: Option<f64>,
    #[serde(alias = "type")]
    pub mode: Option<TriggerMode>,
    pub hidden: Option<bool>,
    pub parent: Option<String>,
}

impl CommandManifest {
    /// Handler identity: the `handler` field, else the file stem.
    pub fn handler_identity(&self, path: &Path) -> String {
        self.handler.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Overlays the manifest onto a handler-built definition.
    pub fn apply(self, mut def: CommandDefinition) -> CommandDefinition {
        if let Some(name) = self.name {
            def = def.name(name);
        }
        if let Some(aliases) = self.aliases {
            def = def.aliases(aliases);
        }
        if let Some(categories) = self.categories {
            def = def.categories(categories);
        }
        if let Some(examples) = self.examples {
            def = def.examples(examples);
        }
        if let Some(description) = self.description {
            def = def.description(description);
        }
        if let Some(args) = self.args {
            def = def.args(args.into_iter().map(ArgumentSpec::from).collect());
        }

        let mut guards = *def.guard_set();
        if let Some(admin_only) = self.admin_only {
            guards.admin_only = admin_only;
        }
        if let Some(nsfw) = self.nsfw {
            guards.nsfw = nsfw;
        }
        if let Some(dm) = self.dm {
            guards.dm = dm;
        }
        if let Some(permissions) = self.permissions {
            guards.permissions = permissions;
        }
        def = def.guards(guards);

        if let Some(seconds) = self.cooldown.filter(|s| s.is_finite() && *s >= 0.0) {
            def = def.cooldown(Duration::from_secs_f64(seconds));
        }
        if let Some(mode) = self.mode {
            def = def.mode(mode);
        }
        if let Some(hidden) = self.hidden {
            def = def.hidden(hidden);
        }
        if let Some(parent) = self.parent {
            def = def.parent(parent);
        }
        def
    }
}

/// Reads one manifest and instantiates its handler.
pub fn load_manifest(path: &Path, handlers: &HandlerRegistry) -> CatalogResult<CommandDefinition> {
    let raw = fs::read_to_string(path).map_err(|source| CatalogError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: CommandManifest =
        serde_json::from_str(&raw).map_err(|source| CatalogError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;

    let identity = manifest.handler_identity(path);
    let def = handlers.build(&identity, path)?;
    let def = manifest.apply(def).source(path);
    trace!(path = %path.display(), command = %def.key(), "Loaded command manifest");
    Ok(def)
}

/// Result of scanning a commands folder.
#[derive(Debug, Default)]
pub struct FolderLoad {
    pub definitions: Vec<CommandDefinition>,
    pub failures: Vec<CatalogError>,
}

/// Whether `path` names a manifest file.
pub fn is_manifest(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Loads every `*.json` manifest in `dir`, in file-name order.
///
/// A missing folder yields an empty load. Per-file failures are collected
/// and do not stop the scan.
pub fn load_manifest_dir(dir: &Path, handlers: &HandlerRegistry) -> FolderLoad {
    let mut load = FolderLoad::default();
    if !dir.exists() {
        return load;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(source) => {
            load.failures.push(CatalogError::ManifestRead {
                path: dir.to_path_buf(),
                source,
            });
            return load;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_manifest(path))
        .collect();
    paths.sort();

    for path in paths {
        match load_manifest(&path, handlers) {
            Ok(def) => load.definitions.push(def),
            Err(err) => load.failures.push(err),
        }
    }
    load
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ExecutionRequest;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Ping;

    #[async_trait]
    impl Command for Ping {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn handlers() -> HandlerRegistry {
        let handlers = HandlerRegistry::new();
        handlers.register_default::<Ping>("ping");
        handlers
    }

    #[test]
    fn test_manifest_overrides_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ping.json");
        fs::write(
            &path,
            r#"{
                "aliases": ["P"],
                "args": [{"name": "target", "type": "user", "optional": true}],
                "dm": true,
                "cooldown": 2.5,
                "type": "slash"
            }"#,
        )
        .unwrap();

        let def = load_manifest(&path, &handlers()).unwrap();
        assert_eq!(def.command_name(), "ping");
        assert_eq!(def.alias_list(), ["p"]);
        assert_eq!(def.arg_specs().len(), 1);
        assert_eq!(def.arg_specs()[0].kind(), &ArgKind::User);
        assert!(def.guard_set().dm);
        assert_eq!(def.cooldown_period(), Duration::from_millis(2500));
        assert_eq!(def.trigger_mode(), TriggerMode::Structured);
        assert_eq!(def.source_path(), Some(path.as_path()));
    }

    #[test]
    fn test_unknown_handler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pong.json");
        fs::write(&path, "{}").unwrap();

        let err = load_manifest(&path, &handlers()).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnknownHandler { ref handler, .. } if handler == "pong"
        ));
        assert_eq!(err.kind(), cog_core::ErrorKind::CommandInstance);
    }

    #[test]
    fn test_failing_factory() {
        let handlers = HandlerRegistry::new();
        handlers.register("broken", || anyhow::bail!("no database"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{}").unwrap();

        let err = load_manifest(&path, &handlers).unwrap_err();
        assert!(matches!(err, CatalogError::HandlerFailed { .. }));
    }

    #[test]
    fn test_dir_collects_failures_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ping.json"), r#"{"name": "ping"}"#).unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let load = load_manifest_dir(dir.path(), &handlers());
        assert_eq!(load.definitions.len(), 1);
        assert_eq!(load.failures.len(), 1);
        assert_eq!(load.failures[0].kind(), cog_core::ErrorKind::CommandLoad);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let load = load_manifest_dir(Path::new("/no/such/commands"), &handlers());
        assert!(load.definitions.is_empty());
        assert!(load.failures.is_empty());
    }
}
