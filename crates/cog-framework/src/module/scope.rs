use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cog_core::{
    ListenOptions, Listener, Method, RouteDefinition, RouteHandler, TranslationResult, Translations,
};
use anyhow::Context;
use tracing::debug;

use crate::command::{CommandDefinition, HandlerRegistry, load_manifest_dir};
use crate::model::ModelDefinition;
use crate::reporter::{ErrorReporter, ReportContext};
use crate::service::ServiceRegistry;

/// A listener waiting for the module to be merged.
pub struct StagedListener {
    pub source: String,
    pub event: String,
    pub listener: Listener,
    pub options: ListenOptions,
}

/// Registrations collected during one module activation.
///
/// Nothing staged here is visible to the application until the whole
/// lifecycle has succeeded.
pub struct ModuleScope {
    module: String,
    root: PathBuf,
    handlers: HandlerRegistry,
    services: Arc<ServiceRegistry>,
    reporter: Arc<ErrorReporter>,
    commands: Vec<CommandDefinition>,
    listeners: Vec<StagedListener>,
    translations: Translations,
    routes: Vec<RouteDefinition>,
    models: Vec<ModelDefinition>,
}

pub(crate) struct StagedParts {
    pub commands: Vec<CommandDefinition>,
    pub listeners: Vec<StagedListener>,
    pub translations: Translations,
    pub routes: Vec<RouteDefinition>,
    pub models: Vec<ModelDefinition>,
}

impl ModuleScope {
    pub(crate) fn new(
        module: String,
        root: PathBuf,
        handlers: HandlerRegistry,
        services: Arc<ServiceRegistry>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            module,
            root,
            handlers,
            services,
            reporter,
            commands: Vec::new(),
            listeners: Vec::new(),
            translations: Translations::new(),
            routes: Vec::new(),
            models: Vec::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    // ─── Commands ────────────────────────────────────────────────────────────

    pub fn add_command(&mut self, def: CommandDefinition) {
        self.commands.push(def);
    }

    /// Stages every manifest in `<root>/commands`.
    ///
    /// Broken manifests are reported and skipped. Returns how many commands
    /// were staged.
    pub fn load_commands_folder(&mut self) -> usize {
        let dir = self.root.join("commands");
        let load = load_manifest_dir(&dir, &self.handlers);
        for err in &load.failures {
            let subject = format!("{}: {}", self.module, dir.display());
            self.reporter
                .handle_error(err, ReportContext::new(err.kind()).subject(subject));
        }
        let staged = load.definitions.len();
        self.commands.extend(load.definitions);
        debug!(module = %self.module, staged, "Staged module commands");
        staged
    }

    // ─── Events ──────────────────────────────────────────────────────────────

    pub fn listen(
        &mut self,
        source: impl Into<String>,
        event: impl Into<String>,
        listener: Listener,
    ) {
        self.listen_with(source, event, listener, ListenOptions::default());
    }

    pub fn listen_with(
        &mut self,
        source: impl Into<String>,
        event: impl Into<String>,
        listener: Listener,
        options: ListenOptions,
    ) {
        self.listeners.push(StagedListener {
            source: source.into(),
            event: event.into(),
            listener,
            options,
        });
    }

    // ─── Translations ────────────────────────────────────────────────────────

    pub fn set_translation(
        &mut self,
        key: impl Into<String>,
        language: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.translations.set(key, language, text);
    }

    /// Stages `<root>/translations`. A missing folder stages nothing.
    pub fn load_translations_folder(&mut self) -> TranslationResult<usize> {
        self.translations.load_folder(&self.root.join("translations"), "")
    }

    // ─── Routes ──────────────────────────────────────────────────────────────

    pub fn route<H: RouteHandler + 'static>(
        &mut self,
        method: Method,
        path: impl Into<String>,
        handler: H,
    ) {
        self.routes.push(RouteDefinition::new(method, path, handler));
    }

    // ─── Models ──────────────────────────────────────────────────────────────

    pub fn add_model(&mut self, name: impl Into<String>, schema: serde_json::Value) {
        self.models.push(ModelDefinition::new(name, schema));
    }

    /// Stages every `<root>/models/<Name>.json`, named after the file stem.
    /// A missing folder stages nothing.
    pub fn load_models_folder(&mut self) -> anyhow::Result<usize> {
        let dir = self.root.join("models");
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("reading {}", dir.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .with_context(|| format!("reading {}", dir.display()))?;
        paths.retain(|path| path.extension().is_some_and(|ext| ext == "json"));
        paths.sort();

        for path in &paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let schema: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            self.models.push(ModelDefinition::new(name, schema));
        }
        debug!(module = %self.module, staged = paths.len(), "Staged module models");
        Ok(paths.len())
    }

    pub fn staged_commands(&self) -> usize {
        self.commands.len()
    }

    pub(crate) fn into_parts(self) -> StagedParts {
        StagedParts {
            commands: self.commands,
            listeners: self.listeners,
            translations: self.translations,
            routes: self.routes,
            models: self.models,
        }
    }
}
