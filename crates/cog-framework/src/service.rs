//! Lazily constructed, memoized service graph.
//!
//! [`ServiceRegistry`] holds cross-cutting services (translation store,
//! permission checker, error reporter, …) keyed by a stable identity string.
//! Each registration names the identities it depends on; [`resolve`] builds
//! dependencies depth-first before the target and caches singletons.
//!
//! Every resolution carries its own in-progress path, so a dependency chain
//! that loops back fails fast with [`ServiceError::CircularDependency`]
//! instead of recursing forever. Concurrent resolutions never see each
//! other's paths.
//!
//! Instances are stored as `Arc<Arc<T>>` behind `dyn Any`, which lets the
//! typed helpers hand out `Arc<dyn Trait>` as well as concrete types.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = ServiceRegistry::new();
//! registry.register_instance("config", Arc::new(Settings::default()));
//! registry.register_factory("greeter", &["config"], true, |deps| {
//!     let settings = deps.get::<Settings>("config")?;
//!     Ok(Arc::new(Greeter::new(settings)))
//! });
//! let greeter = registry.get::<Greeter>("greeter")?;
//! ```
//!
//! [`resolve`]: ServiceRegistry::resolve

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};

/// Type-erased service instance.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// Builds a service from its resolved dependencies.
pub type ServiceFactory =
    Arc<dyn Fn(&ResolvedDependencies) -> anyhow::Result<ServiceArc> + Send + Sync>;

/// Dependencies handed to a factory, in declaration order.
pub struct ResolvedDependencies {
    entries: Vec<(String, ServiceArc)>,
}

impl ResolvedDependencies {
    /// Returns the dependency registered as `identity`, downcast to `T`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, identity: &str) -> ServiceResult<Arc<T>> {
        let arc = self
            .raw(identity)
            .ok_or_else(|| ServiceError::not_found(identity, None))?;
        downcast(identity, arc)
    }

    /// Returns the type-erased dependency.
    pub fn raw(&self, identity: &str) -> Option<&ServiceArc> {
        self.entries
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, arc)| arc)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(
    identity: &str,
    arc: &ServiceArc,
) -> ServiceResult<Arc<T>> {
    arc.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| ServiceError::TypeMismatch {
            identity: identity.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

struct ServiceEntry {
    dependencies: Vec<String>,
    singleton: bool,
    factory: Option<ServiceFactory>,
    cached: RwLock<Option<ServiceArc>>,
}

// =============================================================================
// ServiceRegistry
// =============================================================================

/// Dependency-injected service container.
///
/// The registry is an explicit object: the runtime builds one per process
/// and shares it by `Arc`; tests build a fresh one each.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers a factory-built service.
    ///
    /// Re-registering an identity replaces the previous entry and drops its
    /// cached instance.
    pub fn register<F>(
        &self,
        identity: impl Into<String>,
        dependencies: &[&str],
        singleton: bool,
        factory: F,
    ) where
        F: Fn(&ResolvedDependencies) -> anyhow::Result<ServiceArc> + Send + Sync + 'static,
    {
        self.insert(
            identity.into(),
            ServiceEntry {
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                singleton,
                factory: Some(Arc::new(factory)),
                cached: RwLock::new(None),
            },
        );
    }

    /// Registers a typed factory. The returned `Arc<T>` is wrapped for storage.
    pub fn register_factory<T, F>(
        &self,
        identity: impl Into<String>,
        dependencies: &[&str],
        singleton: bool,
        factory: F,
    ) where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolvedDependencies) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(identity, dependencies, singleton, move |deps| {
            factory(deps).map(|instance| Arc::new(instance) as ServiceArc)
        });
    }

    /// Registers a pre-built instance. It behaves as a singleton.
    pub fn register_instance<T: ?Sized + Send + Sync + 'static>(
        &self,
        identity: impl Into<String>,
        instance: Arc<T>,
    ) {
        self.insert(
            identity.into(),
            ServiceEntry {
                dependencies: Vec::new(),
                singleton: true,
                factory: None,
                cached: RwLock::new(Some(Arc::new(instance) as ServiceArc)),
            },
        );
    }

    fn insert(&self, identity: String, entry: ServiceEntry) {
        let previous = self.entries.write().insert(identity.clone(), Arc::new(entry));
        if previous.is_some() {
            warn!(service = %identity, "Service re-registered, last registration wins");
        } else {
            debug!(service = %identity, "Service registered");
        }
    }

    // ─── Lookup ──────────────────────────────────────────────────────────────

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.read().contains_key(identity)
    }

    /// Every registered identity, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Resolves `identity`, building its dependencies first.
    pub fn resolve(&self, identity: &str) -> ServiceResult<ServiceArc> {
        let mut path = Vec::new();
        self.resolve_in(identity, &mut path)
    }

    /// Resolves `identity` and downcasts it to `T`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, identity: &str) -> ServiceResult<Arc<T>> {
        let arc = self.resolve(identity)?;
        downcast(identity, &arc)
    }

    fn resolve_in(&self, identity: &str, path: &mut Vec<String>) -> ServiceResult<ServiceArc> {
        let entry = self
            .entries
            .read()
            .get(identity)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(identity, path.last().map(String::as_str)))?;

        if let Some(instance) = entry.cached.read().as_ref() {
            return Ok(Arc::clone(instance));
        }

        if let Some(pos) = path.iter().position(|id| id == identity) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(identity.to_string());
            return Err(ServiceError::CircularDependency { cycle });
        }

        let Some(factory) = entry.factory.clone() else {
            return Err(ServiceError::not_found(identity, path.last().map(String::as_str)));
        };

        path.push(identity.to_string());
        let resolved = entry
            .dependencies
            .iter()
            .map(|dep| self.resolve_in(dep, path).map(|arc| (dep.clone(), arc)))
            .collect::<ServiceResult<Vec<_>>>();
        path.pop();

        let deps = ResolvedDependencies { entries: resolved? };
        let built = factory(&deps).map_err(|source| ServiceError::Construction {
            identity: identity.to_string(),
            source,
        })?;

        if !entry.singleton {
            return Ok(built);
        }

        // First stored instance wins when two resolutions race.
        let mut slot = entry.cached.write();
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        *slot = Some(Arc::clone(&built));
        debug!(service = %identity, "Singleton service constructed");
        Ok(built)
    }
}
