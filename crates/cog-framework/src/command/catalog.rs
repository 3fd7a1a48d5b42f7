//! The live command index.
//!
//! [`CommandCatalog`] maps catalog keys (`name`, or `parent name` for
//! sub-commands) to `Arc<CommandDefinition>`. Readers clone the `Arc` and
//! release the lock before executing, so a hot reload that swaps an entry
//! never disturbs an in-flight execution.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::definition::{CommandDefinition, command_key};
use super::manifest::{HandlerRegistry, load_manifest_dir};
use crate::error::CatalogError;

#[derive(Default)]
struct CatalogInner {
    entries: HashMap<String, Arc<CommandDefinition>>,
    /// Top-level alias → command name.
    aliases: HashMap<String, String>,
}

impl CatalogInner {
    fn unindex_aliases(&mut self, def: &CommandDefinition) {
        if def.parent_name().is_some() {
            return;
        }
        for alias in def.alias_list() {
            if self.aliases.get(alias).is_some_and(|name| name == def.command_name()) {
                self.aliases.remove(alias);
            }
        }
    }

    fn remove_key(&mut self, key: &str) -> Option<Arc<CommandDefinition>> {
        let removed = self.entries.remove(key)?;
        self.unindex_aliases(&removed);
        Some(removed)
    }
}

/// Result of [`CommandCatalog::load_folder`].
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Keys indexed, in load order.
    pub loaded: Vec<String>,
    pub failures: Vec<CatalogError>,
}

/// Thread-safe command index.
#[derive(Default)]
pub struct CommandCatalog {
    inner: RwLock<CatalogInner>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a definition, replacing any entry with the same key or the
    /// same source file. Returns the replaced entry.
    pub fn set(&self, def: CommandDefinition) -> Option<Arc<CommandDefinition>> {
        let def = Arc::new(def);
        let key = def.key();
        let mut inner = self.inner.write();

        if let Some(source) = def.source_path() {
            let renamed: Vec<String> = inner
                .entries
                .iter()
                .filter(|(k, existing)| **k != key && existing.source_path() == Some(source))
                .map(|(k, _)| k.clone())
                .collect();
            for stale in renamed {
                debug!(command = %stale, "Dropping entry renamed by reload");
                inner.remove_key(&stale);
            }
        }

        let previous = inner.remove_key(&key);
        if previous.is_some() {
            debug!(command = %key, "Replacing command definition");
        }

        if def.parent_name().is_none() {
            for alias in def.alias_list() {
                if let Some(owner) = inner.aliases.get(alias).filter(|o| *o != def.command_name()) {
                    warn!(
                        alias = %alias,
                        previous = %owner,
                        command = %key,
                        "Alias reassigned, last registration wins"
                    );
                }
                inner.aliases.insert(alias.clone(), def.command_name().to_string());
            }
        }
        inner.entries.insert(key, def);
        previous
    }

    /// Top-level command by name or alias, case-insensitive.
    pub fn get(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        let name = name.to_lowercase();
        let inner = self.inner.read();
        inner
            .entries
            .get(&name)
            .or_else(|| inner.aliases.get(&name).and_then(|target| inner.entries.get(target)))
            .filter(|def| def.parent_name().is_none())
            .cloned()
    }

    /// Sub-command `name` under `parent`.
    pub fn get_sub(&self, parent: &str, name: &str) -> Option<Arc<CommandDefinition>> {
        self.get_by_key(&command_key(Some(parent), name))
    }

    pub fn get_by_key(&self, key: &str) -> Option<Arc<CommandDefinition>> {
        self.inner.read().entries.get(&key.to_lowercase()).cloned()
    }

    /// Every entry, sorted by key.
    pub fn get_all(&self) -> Vec<Arc<CommandDefinition>> {
        let inner = self.inner.read();
        let mut all: Vec<_> = inner.entries.values().cloned().collect();
        all.sort_by_key(|def| def.key());
        all
    }

    /// Names of top-level commands, sorted.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner
            .entries
            .values()
            .filter(|def| def.parent_name().is_none())
            .map(|def| def.command_name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Sub-commands of `parent`, sorted by name.
    pub fn children(&self, parent: &str) -> Vec<Arc<CommandDefinition>> {
        let parent = parent.to_lowercase();
        let inner = self.inner.read();
        let mut children: Vec<_> = inner
            .entries
            .values()
            .filter(|def| def.parent_name() == Some(parent.as_str()))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.command_name().cmp(b.command_name()));
        children
    }

    pub fn remove(&self, key: &str) -> Option<Arc<CommandDefinition>> {
        self.inner.write().remove_key(&key.to_lowercase())
    }

    /// Removes every entry loaded from `path`, returning their keys.
    pub fn remove_source(&self, path: &Path) -> Vec<String> {
        let mut inner = self.inner.write();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, def)| def.source_path() == Some(path))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            inner.remove_key(key);
        }
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().entries.contains_key(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Loads every manifest in `dir` and indexes the results.
    pub fn load_folder(&self, dir: &Path, handlers: &HandlerRegistry) -> LoadOutcome {
        let load = load_manifest_dir(dir, handlers);
        let mut outcome = LoadOutcome {
            loaded: Vec::with_capacity(load.definitions.len()),
            failures: load.failures,
        };
        for def in load.definitions {
            outcome.loaded.push(def.key());
            self.set(def);
        }
        info!(
            path = %dir.display(),
            loaded = outcome.loaded.len(),
            failed = outcome.failures.len(),
            "Loaded commands folder"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::router::ExecutionRequest;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Command for Noop {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn def(name: &str) -> CommandDefinition {
        CommandDefinition::new(Noop).name(name)
    }

    #[test]
    fn test_lookup_by_name_and_alias_is_case_insensitive() {
        let catalog = CommandCatalog::new();
        catalog.set(def("ping").alias("p"));

        assert!(catalog.get("PING").is_some());
        assert_eq!(catalog.get("P").unwrap().command_name(), "ping");
        assert!(catalog.get("pong").is_none());
    }

    #[test]
    fn test_subcommand_does_not_shadow_top_level() {
        let catalog = CommandCatalog::new();
        catalog.set(def("role"));
        catalog.set(def("add"));
        catalog.set(def("add").parent("role"));

        assert_eq!(catalog.len(), 3);
        assert!(catalog.get("add").unwrap().parent_name().is_none());
        assert_eq!(catalog.get_sub("role", "add").unwrap().key(), "role add");
        assert!(catalog.get("role add").is_none());
        assert_eq!(catalog.children("role").len(), 1);
        assert_eq!(catalog.names(), vec!["add", "role"]);
    }

    #[test]
    fn test_replace_keeps_in_flight_arc() {
        let catalog = CommandCatalog::new();
        catalog.set(def("ping").description("old"));
        let held = catalog.get("ping").unwrap();

        let previous = catalog.set(def("ping").description("new"));

        assert!(previous.is_some());
        assert_eq!(held.description_override(), Some("old"));
        assert_eq!(catalog.get("ping").unwrap().description_override(), Some("new"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_reload_with_new_name_drops_old_entry() {
        let catalog = CommandCatalog::new();
        catalog.set(def("ping").alias("p").source("/mod/commands/ping.json"));
        catalog.set(def("pong").source("/mod/commands/ping.json"));

        assert!(catalog.get("ping").is_none());
        assert!(catalog.get("p").is_none());
        assert!(catalog.get("pong").is_some());
    }

    #[test]
    fn test_remove_source_unindexes_aliases() {
        let catalog = CommandCatalog::new();
        catalog.set(def("ping").alias("p").source("/mod/commands/ping.json"));
        catalog.set(def("help"));

        let removed = catalog.remove_source(Path::new("/mod/commands/ping.json"));

        assert_eq!(removed, vec!["ping".to_string()]);
        assert!(catalog.get("p").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_load_folder() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = r#"{"name": "noop", "aliases": ["n"]}"#;
        std::fs::write(dir.path().join("noop.json"), manifest).unwrap();
        std::fs::write(dir.path().join("ghost.json"), "{}").unwrap();
        let handlers = HandlerRegistry::new();
        handlers.register("noop", || Ok(CommandDefinition::new(Noop)));

        let catalog = CommandCatalog::new();
        let outcome = catalog.load_folder(dir.path(), &handlers);

        assert_eq!(outcome.loaded, vec!["noop".to_string()]);
        assert_eq!(outcome.failures.len(), 1);
        assert!(catalog.get("n").is_some());
    }
}
