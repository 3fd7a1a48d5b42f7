use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use cog_core::{BusError, SubscriptionId};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::descriptor::ModuleDescriptor;
use super::scope::ModuleScope;
use super::{LifecycleStep, Module};
use crate::app::AppContext;
use crate::error::{ModuleError, ModuleResult};
use crate::reporter::ReportContext;

/// An activated module and what it contributed.
pub struct ModuleInstance {
    pub name: String,
    pub root: PathBuf,
    pub module: Arc<dyn Module>,
    /// Catalog keys.
    pub commands: Vec<String>,
    /// `(source, subscription)` pairs.
    pub subscriptions: Vec<(String, SubscriptionId)>,
    /// Route labels.
    pub routes: Vec<String>,
    /// Number of translation strings merged.
    pub translations: usize,
    /// Model names contributed.
    pub models: Vec<String>,
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("commands", &self.commands)
            .field("subscriptions", &self.subscriptions.len())
            .field("routes", &self.routes)
            .field("translations", &self.translations)
            .field("models", &self.models)
            .finish()
    }
}

/// Why a queued module is still pending after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Requirement cycle, first element repeated at the end.
    CircularDependency(Vec<String>),
    /// Required module is neither queued nor active.
    UnknownModule(String),
    /// Required module failed or is itself unresolved.
    BlockedBy(String),
    MissingService(String),
    /// Index of the first predicate that returned `false`.
    PredicateFailed(usize),
    /// Requirements held by diagnosis time; the next resolution activates it.
    ReadyAfterResolution,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircularDependency(cycle) => {
                write!(f, "circular module dependency: {}", cycle.join(" -> "))
            }
            Self::UnknownModule(name) => write!(f, "requires unknown module '{name}'"),
            Self::BlockedBy(name) => write!(f, "blocked by module '{name}'"),
            Self::MissingService(id) => write!(f, "requires missing service '{id}'"),
            Self::PredicateFailed(index) => {
                write!(f, "activation predicate #{index} returned false")
            }
            Self::ReadyAfterResolution => write!(f, "became ready after resolution finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedModule {
    pub name: String,
    pub reason: UnresolvedReason,
}

#[derive(Default)]
struct ActiveSet {
    by_name: HashMap<String, Arc<ModuleInstance>>,
    order: Vec<String>,
}

/// Activates queued modules once their requirements hold.
///
/// ```rust,ignore
/// let activator = ModuleActivator::new(app.clone());
/// activator.queue_activation(ModuleDescriptor::conventional("modules/basics"));
/// activator.queue_activation(
///     ModuleDescriptor::of::<Moderation>("modules/moderation").requires_module("basics"),
/// );
/// for unresolved in activator.resolve_pending().await {
///     warn!(module = %unresolved.name, reason = %unresolved.reason, "Module left pending");
/// }
/// ```
pub struct ModuleActivator {
    app: AppContext,
    pending: Mutex<Vec<ModuleDescriptor>>,
    active: RwLock<ActiveSet>,
    failed: RwLock<HashSet<String>>,
}

impl ModuleActivator {
    pub fn new(app: AppContext) -> Self {
        Self {
            app,
            pending: Mutex::new(Vec::new()),
            active: RwLock::new(ActiveSet::default()),
            failed: RwLock::new(HashSet::new()),
        }
    }

    pub fn app(&self) -> &AppContext {
        &self.app
    }

    pub fn queue_activation(&self, descriptor: ModuleDescriptor) {
        debug!(module = %descriptor.resolved_name(), "Queued module activation");
        self.pending.lock().push(descriptor);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.read().by_name.contains_key(name)
    }

    /// Active module names, in activation order.
    pub fn active_modules(&self) -> Vec<String> {
        self.active.read().order.clone()
    }

    pub fn module(&self, name: &str) -> Option<Arc<ModuleInstance>> {
        self.active.read().by_name.get(name).cloned()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Activates everything that can be activated.
    ///
    /// Runs passes until the queue is empty or a pass activates nothing.
    /// Modules whose requirements never hold stay queued and are returned
    /// with the reason; a later call re-evaluates them.
    pub async fn resolve_pending(&self) -> Vec<UnresolvedModule> {
        let mut pass = 0usize;
        loop {
            let queued = std::mem::take(&mut *self.pending.lock());
            if queued.is_empty() {
                break;
            }
            pass += 1;

            let mut ready = Vec::new();
            let mut waiting = Vec::new();
            for desc in queued {
                match self.readiness(&desc).await {
                    Ok(()) => ready.push(desc),
                    Err(_) => waiting.push(desc),
                }
            }
            self.requeue(waiting);

            if ready.is_empty() {
                break;
            }
            debug!(pass, ready = ready.len(), "Activating module layer");
            let results = join_all(ready.into_iter().map(|desc| self.activate(desc))).await;
            if !results.into_iter().any(|activated| activated) {
                break;
            }
        }

        let leftover = self.pending.lock().clone();
        let unresolved = self.diagnose(&leftover).await;
        for entry in &unresolved {
            let err = ModuleError::Unresolved {
                module: entry.name.clone(),
                reason: entry.reason.clone(),
            };
            self.report(&err);
        }
        info!(
            active = self.active.read().order.len(),
            unresolved = unresolved.len(),
            "Module resolution finished"
        );
        unresolved
    }

    fn requeue(&self, descriptors: Vec<ModuleDescriptor>) {
        if descriptors.is_empty() {
            return;
        }
        let mut pending = self.pending.lock();
        // Keep queue order: entries queued meanwhile go after the requeued ones.
        let queued_meanwhile = std::mem::replace(&mut *pending, descriptors);
        pending.extend(queued_meanwhile);
    }

    /// First unmet requirement, modules before services before predicates.
    async fn readiness(&self, desc: &ModuleDescriptor) -> Result<(), UnresolvedReason> {
        if let Some(missing) = desc
            .module_requirements()
            .iter()
            .find(|name| !self.is_active(name))
        {
            return Err(UnresolvedReason::BlockedBy(missing.clone()));
        }
        if let Some(missing) = desc
            .service_requirements()
            .iter()
            .find(|id| !self.app.services.contains(id))
        {
            return Err(UnresolvedReason::MissingService(missing.clone()));
        }
        for (index, predicate) in desc.predicates().iter().enumerate() {
            if !predicate().await {
                return Err(UnresolvedReason::PredicateFailed(index));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Activation
    // =========================================================================

    async fn activate(&self, desc: ModuleDescriptor) -> bool {
        let name = desc.resolved_name();
        match self.try_activate(&name, &desc).await {
            Ok(instance) => {
                info!(
                    module = %name,
                    commands = instance.commands.len(),
                    listeners = instance.subscriptions.len(),
                    routes = instance.routes.len(),
                    translations = instance.translations,
                    models = instance.models.len(),
                    "Module activated"
                );
                true
            }
            Err(err) => {
                if !matches!(err, ModuleError::AlreadyActive { .. }) {
                    self.failed.write().insert(name);
                }
                self.report(&err);
                false
            }
        }
    }

    async fn try_activate(
        &self,
        name: &str,
        desc: &ModuleDescriptor,
    ) -> ModuleResult<Arc<ModuleInstance>> {
        if self.is_active(name) {
            return Err(ModuleError::AlreadyActive {
                module: name.to_string(),
            });
        }

        let module = desc
            .build(Arc::clone(&self.app.services))
            .map_err(|source| ModuleError::Construction {
                module: name.to_string(),
                source,
            })?;

        let mut scope = ModuleScope::new(
            name.to_string(),
            desc.root().to_path_buf(),
            self.app.handlers.clone(),
            Arc::clone(&self.app.services),
            Arc::clone(&self.app.reporter),
        );
        for step in LifecycleStep::ALL {
            let result = match step {
                LifecycleStep::Commands => module.register_commands(&mut scope).await,
                LifecycleStep::Events => module.register_events(&mut scope).await,
                LifecycleStep::Translations => module.register_translations(&mut scope).await,
                LifecycleStep::Models => module.register_models(&mut scope).await,
                LifecycleStep::Routes => module.register_routes(&mut scope).await,
            };
            result.map_err(|source| ModuleError::Lifecycle {
                module: name.to_string(),
                step,
                source,
            })?;
        }

        self.merge(name, desc, Arc::from(module), scope)
    }

    /// Publishes a scope's registrations. Validation happens before any
    /// registry is touched.
    fn merge(
        &self,
        name: &str,
        desc: &ModuleDescriptor,
        module: Arc<dyn Module>,
        scope: ModuleScope,
    ) -> ModuleResult<Arc<ModuleInstance>> {
        let mut active = self.active.write();
        if active.by_name.contains_key(name) {
            return Err(ModuleError::AlreadyActive {
                module: name.to_string(),
            });
        }

        let parts = scope.into_parts();
        if let Some(missing) = parts
            .listeners
            .iter()
            .find(|staged| !self.app.events.has_source(&staged.source))
        {
            return Err(ModuleError::Event {
                module: name.to_string(),
                source: BusError::SourceNotFound(missing.source.clone()),
            });
        }

        let routes = parts.routes.iter().map(|route| route.label()).collect();
        self.app
            .routes
            .register_all(parts.routes)
            .map_err(|source| ModuleError::Route {
                module: name.to_string(),
                source,
            })?;

        let mut commands = Vec::with_capacity(parts.commands.len());
        for def in parts.commands {
            commands.push(def.key());
            if let Some(previous) = self.app.catalog.set(def) {
                warn!(module = %name, command = %previous.key(), "Command replaced by module");
            }
        }

        let mut subscriptions = Vec::with_capacity(parts.listeners.len());
        for staged in parts.listeners {
            match self.app.events.add_listener(
                &staged.source,
                &staged.event,
                staged.listener,
                staged.options,
            ) {
                Ok(id) => subscriptions.push((staged.source, id)),
                // Source removed after validation; the rest of the module stays.
                Err(err) => warn!(module = %name, error = %err, "Dropped module listener"),
            }
        }

        let translations = parts.translations.len();
        self.app.translations.merge(&parts.translations);

        let mut models = Vec::with_capacity(parts.models.len());
        for def in parts.models {
            models.push(def.name.clone());
            self.app.models.merge(def);
        }

        let instance = Arc::new(ModuleInstance {
            name: name.to_string(),
            root: desc.root().to_path_buf(),
            module,
            commands,
            subscriptions,
            routes,
            translations,
            models,
        });
        active.by_name.insert(name.to_string(), Arc::clone(&instance));
        active.order.push(name.to_string());
        Ok(instance)
    }

    // =========================================================================
    // Diagnosis
    // =========================================================================

    async fn diagnose(&self, leftover: &[ModuleDescriptor]) -> Vec<UnresolvedModule> {
        let graph: HashMap<String, Vec<String>> = leftover
            .iter()
            .map(|desc| {
                let unmet = desc
                    .module_requirements()
                    .iter()
                    .filter(|name| !self.is_active(name))
                    .cloned()
                    .collect();
                (desc.resolved_name(), unmet)
            })
            .collect();

        let mut unresolved = Vec::new();
        for desc in leftover {
            let name = desc.resolved_name();
            let reason = match self.readiness(desc).await {
                Ok(()) => UnresolvedReason::ReadyAfterResolution,
                Err(UnresolvedReason::BlockedBy(required)) => {
                    if let Some(cycle) = find_cycle(&graph, &name) {
                        UnresolvedReason::CircularDependency(cycle)
                    } else if self.failed.read().contains(&required)
                        || graph.contains_key(&required)
                    {
                        UnresolvedReason::BlockedBy(required)
                    } else {
                        UnresolvedReason::UnknownModule(required)
                    }
                }
                Err(other) => other,
            };
            unresolved.push(UnresolvedModule { name, reason });
        }
        unresolved
    }

    fn report(&self, err: &ModuleError) {
        self.app.reporter.handle_error(
            err,
            ReportContext::new(err.kind()).subject(err.module()),
        );
    }
}

/// Cycle through `start`, as a path that ends where it began.
fn find_cycle(graph: &HashMap<String, Vec<String>>, start: &str) -> Option<Vec<String>> {
    fn visit(
        graph: &HashMap<String, Vec<String>>,
        node: &str,
        start: &str,
        path: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> bool {
        path.push(node.to_string());
        for next in graph.get(node).into_iter().flatten() {
            if next == start {
                path.push(next.clone());
                return true;
            }
            let in_progress = path.iter().any(|p| p == next);
            if !in_progress && !done.contains(next) && visit(graph, next, start, path, done) {
                return true;
            }
        }
        path.pop();
        done.insert(node.to_string());
        false
    }

    let mut path = Vec::new();
    let mut done = HashSet::new();
    visit(graph, start, start, &mut path, &mut done).then_some(path)
}
