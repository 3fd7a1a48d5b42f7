//! Runtime orchestration: configuration, module activation and routing.
//!
//! ```rust,ignore
//! use cog_runtime::CogRuntime;
//!
//! let runtime = CogRuntime::builder()
//!     .config_file("cog.toml")
//!     .command_publisher(Arc::new(MyPublisher::new()))
//!     .build()?;
//!
//! runtime.handlers().register_default::<Ping>("ping");
//! runtime.run().await?;
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cog_core::{
    ApiRequest, ApiResponse, CommandPublisher, ContextStore, FRAMEWORK_SOURCE, MemberDirectory,
    MemoryContextStore, PermissionChecker,
};
use cog_framework::{
    AppContext, CommandCatalog, CommandRouter, DispatchOutcome, ErrorReporter, FolderWatch,
    HandlerRegistry, ModuleActivator, ModuleDescriptor, ReportContext, ReportSink, RouterConfig,
    Trigger, UnresolvedModule,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::config::{CogConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::{self, LoggingBuilder};

/// Identities the runtime adds to the service registry.
pub mod identity {
    pub const CONFIG: &str = "config";
    pub const CONTEXT_STORE: &str = "context_store";
}

/// Event emitted on the `framework` source once startup completes.
pub const READY_EVENT: &str = "ready";
/// Event emitted on the `framework` source when the runtime stops.
pub const SHUTDOWN_EVENT: &str = "shutdown";

const TERMINATION_POLL: Duration = Duration::from_millis(250);

/// What startup activated. Also the `ready` event payload.
#[derive(Debug, Clone, Serialize)]
pub struct StartupSummary {
    pub modules: usize,
    pub commands: usize,
    pub translations: usize,
    pub routes: usize,
    /// Merged model schema names, sorted.
    pub models: Vec<String>,
    pub unresolved: Vec<String>,
}

/// The Cog runtime.
pub struct CogRuntime {
    config: Arc<CogConfig>,
    app: AppContext,
    activator: ModuleActivator,
    router: CommandRouter,
    publisher: Option<Arc<dyn CommandPublisher>>,
    explicit: Mutex<Vec<ModuleDescriptor>>,
    watches: Mutex<Vec<FolderWatch>>,
    running: AtomicBool,
}

impl CogRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    fn assemble(config: CogConfig, reporter: Arc<ErrorReporter>, parts: Collaborators) -> Self {
        let config = Arc::new(config);
        let app = AppContext::with_reporter(reporter);

        let contexts: Arc<dyn ContextStore> = match parts.contexts {
            Some(store) => store,
            None => Arc::new(MemoryContextStore::new(config.commands.default_prefix.clone())),
        };
        app.services
            .register_instance(identity::CONFIG, Arc::clone(&config));
        app.services
            .register_instance::<dyn ContextStore>(identity::CONTEXT_STORE, Arc::clone(&contexts));

        let mut router = CommandRouter::new(
            Arc::clone(&app.catalog),
            contexts,
            Arc::clone(&app.reporter),
        )
        .with_translations(Arc::clone(&app.translations))
        .with_events(Arc::clone(&app.events))
        .with_config(RouterConfig {
            default_prefix: config.commands.default_prefix.clone(),
            max_correction_distance: config.commands.max_correction_distance,
        });
        if let Some(checker) = parts.permissions {
            router = router.with_permissions(checker);
        }
        if let Some(directory) = parts.members {
            router = router.with_members(directory);
        }

        info!(
            debug = config.debug,
            default_prefix = %config.commands.default_prefix,
            modules_dir = %config.modules.dir.display(),
            "Runtime initialized from configuration"
        );

        Self {
            activator: ModuleActivator::new(app.clone()),
            app,
            router,
            publisher: parts.publisher,
            explicit: Mutex::new(parts.modules),
            watches: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            config,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &CogConfig {
        &self.config
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn catalog(&self) -> &Arc<CommandCatalog> {
        &self.app.catalog
    }

    /// Command handler factories; register before [`start`](Self::start).
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.app.handlers
    }

    pub fn activator(&self) -> &ModuleActivator {
        &self.activator
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queues a module for the next [`start`](Self::start). Its name claims
    /// the matching folder under `modules.dir`.
    pub fn add_module(&self, descriptor: ModuleDescriptor) {
        self.explicit.lock().push(descriptor);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Activates modules, starts development watchers, publishes remote
    /// commands and emits `ready`.
    pub async fn start(&self) -> StartupSummary {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return self.summary(&[]);
        }
        info!("Starting Cog runtime");

        self.queue_modules();
        let unresolved = self.activator.resolve_pending().await;
        for entry in &unresolved {
            warn!(module = %entry.name, reason = %entry.reason, "Module left pending");
        }

        if self.config.debug {
            self.watch_command_folders();
        }
        self.publish_commands().await;

        let summary = self.summary(&unresolved);
        info!(
            modules = summary.modules,
            commands = summary.commands,
            translations = summary.translations,
            routes = summary.routes,
            models = summary.models.len(),
            unresolved = summary.unresolved.len(),
            "Cog runtime started"
        );
        if let Err(e) = self
            .app
            .events
            .emit(READY_EVENT, FRAMEWORK_SOURCE, Arc::new(summary.clone()))
            .await
        {
            warn!(error = %e, "Could not emit ready event");
        }
        summary
    }

    /// Stops watchers and emits `shutdown`.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return;
        }
        info!("Stopping Cog runtime");
        self.watches.lock().clear();
        if let Err(e) = self
            .app
            .events
            .emit(SHUTDOWN_EVENT, FRAMEWORK_SOURCE, Arc::new(()))
            .await
        {
            warn!(error = %e, "Could not emit shutdown event");
        }
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C, SIGTERM or an unrecoverable report.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(async {
            if let Err(e) = shutdown_signal().await {
                error!(error = %e, "Shutdown signal unavailable, waiting for termination only");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs until `shutdown` completes or an unrecoverable report.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        info!("Cog runtime is now running");

        let terminated = tokio::select! {
            _ = shutdown => false,
            _ = self.wait_for_termination() => true,
        };
        self.stop().await;

        if terminated {
            Err(RuntimeError::Terminated)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Routes one platform trigger.
    pub async fn route(&self, trigger: Trigger) -> DispatchOutcome {
        self.router.route(trigger).await
    }

    /// Serves one API request from the module routes.
    pub async fn invoke(&self, request: ApiRequest) -> ApiResponse {
        self.app.routes.invoke(request).await
    }

    // =========================================================================
    // Startup steps
    // =========================================================================

    /// Explicit descriptors, then bundles, then unclaimed folders of
    /// `modules.dir`, in name order.
    fn queue_modules(&self) {
        let mut claimed = HashSet::new();

        for desc in self.explicit.lock().drain(..) {
            claimed.insert(desc.resolved_name());
            self.activator.queue_activation(desc);
        }

        for bundle in &self.config.modules.bundles {
            let mut desc =
                ModuleDescriptor::conventional(&bundle.path).params(bundle.params.clone());
            if let Some(name) = &bundle.name {
                desc = desc.name(name);
            }
            if claimed.insert(desc.resolved_name()) {
                self.activator.queue_activation(desc);
            } else {
                warn!(bundle = %bundle.path.display(), "Bundle name already claimed, skipped");
            }
        }

        for root in module_folders(&self.config.modules.dir) {
            let desc = ModuleDescriptor::conventional(root);
            if claimed.insert(desc.resolved_name()) {
                self.activator.queue_activation(desc);
            }
        }
    }

    fn watch_command_folders(&self) {
        let mut watches = self.watches.lock();
        for name in self.activator.active_modules() {
            let Some(instance) = self.activator.module(&name) else {
                continue;
            };
            let dir = instance.root.join("commands");
            if !dir.is_dir() {
                continue;
            }
            match self.app.catalog.watch_folder(
                &dir,
                self.app.handlers.clone(),
                Arc::clone(&self.app.reporter),
            ) {
                Ok(watch) => watches.push(watch),
                Err(err) => self
                    .app
                    .reporter
                    .handle_error(&err, ReportContext::new(err.kind()).subject(name)),
            }
        }
        debug!(watches = watches.len(), "Development watchers started");
    }

    async fn publish_commands(&self) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let result = match self
            .app
            .catalog
            .build_remote_definitions(&self.app.translations)
        {
            Ok(commands) => publisher
                .publish(&commands)
                .await
                .map(|()| commands.len())
                .map_err(RuntimeError::from),
            Err(err) => Err(RuntimeError::RemoteDefinitions(err)),
        };
        match result {
            Ok(count) => info!(commands = count, "Published remote commands"),
            Err(err) => self.app.reporter.handle_error(
                &err,
                ReportContext::new(err.kind()).subject("remote commands"),
            ),
        }
    }

    fn summary(&self, unresolved: &[UnresolvedModule]) -> StartupSummary {
        StartupSummary {
            modules: self.activator.active_modules().len(),
            commands: self.app.catalog.len(),
            translations: self.app.translations.len(),
            routes: self.app.routes.len(),
            models: self.app.models.names(),
            unresolved: unresolved.iter().map(|u| u.name.clone()).collect(),
        }
    }

    async fn wait_for_termination(&self) {
        let mut ticker = tokio::time::interval(TERMINATION_POLL);
        loop {
            ticker.tick().await;
            if self.app.reporter.termination_requested() {
                warn!("Termination requested by an unrecoverable failure");
                return;
            }
        }
    }
}

/// Sub-folders of `dir`, sorted. A missing folder yields none.
fn module_folders(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %dir.display(), "No modules folder");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot read modules folder");
            return Vec::new();
        }
    };
    let mut folders: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();
    folders
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

#[derive(Default)]
struct Collaborators {
    contexts: Option<Arc<dyn ContextStore>>,
    permissions: Option<Arc<dyn PermissionChecker>>,
    members: Option<Arc<dyn MemberDirectory>>,
    publisher: Option<Arc<dyn CommandPublisher>>,
    modules: Vec<ModuleDescriptor>,
}

/// Builder for a [`CogRuntime`].
///
/// ```rust,ignore
/// let runtime = CogRuntime::builder()
///     .profile("production")
///     .context_store(Arc::new(MongoContexts::connect(uri).await?))
///     .module(ModuleDescriptor::of::<Moderation>("modules/moderation"))
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<CogConfig>,
    sinks: Vec<Arc<dyn ReportSink>>,
    parts: Collaborators,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
            sinks: Vec::new(),
            parts: Collaborators::default(),
        }
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Overrides one dotted configuration key.
    pub fn set(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.loader = self.loader.set(key, value);
        self
    }

    /// Uses `config` as is, skipping file and environment loading.
    /// It is still validated.
    pub fn config(mut self, config: CogConfig) -> Self {
        self.config = Some(config);
        self
    }

    // ─── Collaborators ───────────────────────────────────────────────────────

    pub fn context_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.parts.contexts = Some(store);
        self
    }

    pub fn permission_checker(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.parts.permissions = Some(checker);
        self
    }

    pub fn member_directory(mut self, directory: Arc<dyn MemberDirectory>) -> Self {
        self.parts.members = Some(directory);
        self
    }

    pub fn command_publisher(mut self, publisher: Arc<dyn CommandPublisher>) -> Self {
        self.parts.publisher = Some(publisher);
        self
    }

    pub fn report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn module(mut self, descriptor: ModuleDescriptor) -> Self {
        self.parts.modules.push(descriptor);
        self
    }

    /// Loads configuration and assembles the runtime.
    ///
    /// Configuration failures are reported as unrecoverable before being
    /// returned.
    pub fn build(self) -> RuntimeResult<CogRuntime> {
        let loaded = match self.config {
            Some(config) => validate_config(&config).map(|()| config),
            None => self.loader.load(),
        };

        let debug = loaded.as_ref().is_ok_and(|config| config.debug);
        let reporter = Arc::new(ErrorReporter::new().with_backtraces(debug));
        for sink in self.sinks {
            reporter.add_sink(sink);
        }

        let config = match loaded {
            Ok(config) => config,
            Err(err) => {
                LoggingBuilder::new().init();
                reporter.handle_error(
                    &err,
                    ReportContext::new(err.kind()).subject("configuration").exit(),
                );
                return Err(err.into());
            }
        };
        logging::init_from_config(&config.logging);
        Ok(CogRuntime::assemble(config, reporter, self.parts))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cog_core::{
        Channel, ErrorKind, Guild, PublishResult, RemoteCommand, Reply, ReplyResult, Responder,
        User,
    };
    use cog_framework::router::Invocation;
    use cog_framework::{Command, ExecutionRequest, MemorySink};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Ping;

    #[async_trait]
    impl Command for Ping {
        async fn execute(&self, request: &ExecutionRequest) -> anyhow::Result<()> {
            request.reply("pong").await?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Replies(Mutex<Vec<String>>);

    #[async_trait]
    impl Responder for Replies {
        async fn reply(&self, reply: Reply) -> ReplyResult<()> {
            self.0.lock().push(reply.content);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPublisher(AtomicUsize);

    #[async_trait]
    impl CommandPublisher for CountingPublisher {
        async fn publish(&self, commands: &[RemoteCommand]) -> PublishResult<()> {
            self.0.store(commands.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(modules_dir: &Path) -> CogConfig {
        let mut config = CogConfig::default();
        config.bot.token = "token".into();
        config.bot.client_id = "client".into();
        config.database.uri = "memory://".into();
        config.modules.dir = modules_dir.to_path_buf();
        config
    }

    fn module_folder(dir: &Path, name: &str, command: &str) {
        let root = dir.join(name);
        fs::create_dir_all(root.join("commands")).unwrap();
        fs::create_dir_all(root.join("translations")).unwrap();
        fs::create_dir_all(root.join("models")).unwrap();
        fs::write(root.join("models/Guild.json"), format!(r#"{{ "{command}": "bool" }}"#)).unwrap();
        fs::write(
            root.join("commands").join(format!("{command}.json")),
            format!(r#"{{ "handler": "{command}" }}"#),
        )
        .unwrap();
        fs::write(
            root.join("translations/en.json"),
            format!(r#"{{ "command": {{ "{command}": {{ "description": "Checks the bot" }} }} }}"#),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_start_activates_scanned_modules() {
        let dir = tempfile::tempdir().unwrap();
        module_folder(dir.path(), "basics", "ping");
        let publisher = Arc::new(CountingPublisher::default());

        let runtime = CogRuntime::builder()
            .config(config(dir.path()))
            .command_publisher(publisher.clone())
            .build()
            .unwrap();
        runtime.handlers().register_default::<Ping>("ping");

        let summary = runtime.start().await;

        assert_eq!(summary.modules, 1);
        assert_eq!(summary.commands, 1);
        assert!(summary.translations >= 1);
        assert_eq!(summary.models, vec!["Guild".to_string()]);
        assert!(summary.unresolved.is_empty());
        assert_eq!(publisher.0.load(Ordering::SeqCst), 1);

        let replies = Arc::new(Replies::default());
        let invocation = Invocation::new(
            User::new("u1", "alice"),
            Channel::guild("c1", "g1"),
            replies.clone(),
        )
        .guild(Guild::new("g1", "Guild", "owner"));
        let outcome = runtime.route(Trigger::message("z-ping", invocation)).await;

        assert!(outcome.is_dispatched());
        assert_eq!(*replies.0.lock(), vec!["pong".to_string()]);
    }

    #[tokio::test]
    async fn test_bundles_and_explicit_modules_claim_names() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("modules");
        module_folder(&modules, "basics", "ping");
        let extra = dir.path().join("vendor");
        module_folder(&extra, "music", "play");

        let mut config = config(&modules);
        config.modules.bundles.push(crate::config::BundleConfig {
            path: extra.join("music"),
            name: Some("jukebox".into()),
            params: serde_json::json!({ "volume": 3 }),
        });

        let runtime = CogRuntime::builder()
            .config(config)
            .module(ModuleDescriptor::conventional(modules.join("basics")).name("basics"))
            .build()
            .unwrap();
        runtime.handlers().register_default::<Ping>("ping");
        runtime.handlers().register_default::<Ping>("play");
        runtime.start().await;

        assert_eq!(runtime.activator().active_modules().len(), 2);
        assert!(runtime.activator().is_active("jukebox"));
        assert!(runtime.activator().is_active("basics"));
        assert!(runtime.catalog().contains("play"));
    }

    #[test]
    fn test_invalid_config_is_reported_as_exit() {
        let sink = Arc::new(MemorySink::new());
        let mut config = config(Path::new("modules"));
        config.bot.token.clear();

        let result = CogRuntime::builder()
            .config(config)
            .report_sink(sink.clone())
            .build();

        assert!(matches!(result, Err(RuntimeError::Config(_))));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].exit);
        assert_eq!(reports[0].kind, ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_run_until_honours_termination() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = CogRuntime::builder()
            .config(config(dir.path()))
            .build()
            .unwrap();

        let err = io::Error::other("store offline");
        runtime
            .app()
            .reporter
            .handle_error(&err, ReportContext::new(ErrorKind::Other).exit());

        let result = runtime.run_until(std::future::pending()).await;

        assert!(matches!(result, Err(RuntimeError::Terminated)));
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_future() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = CogRuntime::builder()
            .config(config(dir.path()))
            .build()
            .unwrap();

        runtime.run_until(async {}).await.unwrap();
        assert!(!runtime.is_running());
    }
}
