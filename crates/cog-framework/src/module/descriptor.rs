use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::{ConventionalModule, Module};
use crate::service::ServiceRegistry;

/// Builds the module instance for one activation.
pub type ModuleFactory = Arc<dyn Fn(ModuleInit) -> anyhow::Result<Box<dyn Module>> + Send + Sync>;

/// Async readiness check evaluated before activation.
pub type Predicate = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// What a module factory receives.
pub struct ModuleInit {
    pub name: String,
    pub root: PathBuf,
    pub params: Value,
    pub services: Arc<ServiceRegistry>,
}

impl ModuleInit {
    /// Deserializes the activation parameters.
    pub fn params<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        T::deserialize(&self.params)
    }
}

/// A queued module activation: where the module lives, how to build it,
/// and what it waits for.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: Option<String>,
    root: PathBuf,
    params: Value,
    requires_modules: Vec<String>,
    requires_services: Vec<String>,
    predicates: Vec<Predicate>,
    factory: ModuleFactory,
}

impl ModuleDescriptor {
    pub fn new<F>(root: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn(ModuleInit) -> anyhow::Result<Box<dyn Module>> + Send + Sync + 'static,
    {
        Self {
            name: None,
            root: root.into(),
            params: Value::Object(Default::default()),
            requires_modules: Vec::new(),
            requires_services: Vec::new(),
            predicates: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Descriptor for a module type with a default constructor.
    pub fn of<M: Module + Default>(root: impl Into<PathBuf>) -> Self {
        Self::new(root, |_| Ok(Box::new(M::default()) as Box<dyn Module>))
    }

    /// Descriptor for a folder with no code of its own.
    pub fn conventional(root: impl Into<PathBuf>) -> Self {
        Self::of::<ConventionalModule>(root)
    }

    // ─── Builder ─────────────────────────────────────────────────────────────

    /// Overrides the folder-derived name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn requires_module(mut self, module: impl Into<String>) -> Self {
        self.requires_modules.push(module.into());
        self
    }

    pub fn requires_service(mut self, identity: impl Into<String>) -> Self {
        self.requires_services.push(identity.into());
        self
    }

    pub fn requires<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.predicates.push(Arc::new(move || predicate().boxed()));
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    /// Explicit name, else the root folder's base name.
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_requirements(&self) -> &[String] {
        &self.requires_modules
    }

    pub fn service_requirements(&self) -> &[String] {
        &self.requires_services
    }

    pub(crate) fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub(crate) fn build(&self, services: Arc<ServiceRegistry>) -> anyhow::Result<Box<dyn Module>> {
        (self.factory)(ModuleInit {
            name: self.resolved_name(),
            root: self.root.clone(),
            params: self.params.clone(),
            services,
        })
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.resolved_name())
            .field("root", &self.root)
            .field("requires_modules", &self.requires_modules)
            .field("requires_services", &self.requires_services)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_name_falls_back_to_folder() {
        let desc = ModuleDescriptor::conventional("modules/basics");
        assert_eq!(desc.resolved_name(), "basics");
        assert_eq!(desc.name("core").resolved_name(), "core");
    }

    #[test]
    fn test_params_deserialize() {
        #[derive(Deserialize)]
        struct Params {
            greeting: String,
        }

        let init = ModuleInit {
            name: "welcome".into(),
            root: PathBuf::from("modules/welcome"),
            params: json!({ "greeting": "hi" }),
            services: Arc::new(ServiceRegistry::new()),
        };
        let params: Params = init.params().unwrap();
        assert_eq!(params.greeting, "hi");
    }
}
