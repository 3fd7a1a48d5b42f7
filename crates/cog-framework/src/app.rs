//! Shared application state.

use std::sync::Arc;

use cog_core::{EventBus, FRAMEWORK_SOURCE, LocalEmitter, Translations};

use crate::command::{CommandCatalog, HandlerRegistry};
use crate::model::ModelRegistry;
use crate::reporter::ErrorReporter;
use crate::route::RouteTable;
use crate::service::ServiceRegistry;

/// Identities under which [`AppContext::new`] registers the core services.
pub mod identity {
    pub const CATALOG: &str = "catalog";
    pub const EVENTS: &str = "events";
    pub const TRANSLATIONS: &str = "translations";
    pub const ROUTES: &str = "routes";
    pub const MODELS: &str = "models";
    pub const ERROR_REPORTER: &str = "error_reporter";
}

/// The application-wide registries, shared by `Arc`.
#[derive(Clone)]
pub struct AppContext {
    pub services: Arc<ServiceRegistry>,
    pub catalog: Arc<CommandCatalog>,
    pub events: Arc<EventBus>,
    pub translations: Arc<Translations>,
    pub routes: Arc<RouteTable>,
    pub models: Arc<ModelRegistry>,
    pub handlers: HandlerRegistry,
    pub reporter: Arc<ErrorReporter>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::with_reporter(Arc::new(ErrorReporter::new()))
    }

    /// Builds the registries around `reporter`.
    ///
    /// The `framework` event source is installed and the shared registries
    /// are published in the service registry.
    pub fn with_reporter(reporter: Arc<ErrorReporter>) -> Self {
        let events = Arc::new(EventBus::new());
        events.add_source(FRAMEWORK_SOURCE, Arc::new(LocalEmitter::new()));

        let app = Self {
            services: Arc::new(ServiceRegistry::new()),
            catalog: Arc::new(CommandCatalog::new()),
            events,
            translations: Arc::new(Translations::new()),
            routes: Arc::new(RouteTable::new(Arc::clone(&reporter))),
            models: Arc::new(ModelRegistry::new()),
            handlers: HandlerRegistry::new(),
            reporter,
        };

        app.services
            .register_instance(identity::CATALOG, Arc::clone(&app.catalog));
        app.services
            .register_instance(identity::EVENTS, Arc::clone(&app.events));
        app.services
            .register_instance(identity::TRANSLATIONS, Arc::clone(&app.translations));
        app.services
            .register_instance(identity::ROUTES, Arc::clone(&app.routes));
        app.services
            .register_instance(identity::MODELS, Arc::clone(&app.models));
        app.services
            .register_instance(identity::ERROR_REPORTER, Arc::clone(&app.reporter));
        app
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_services_registered() {
        let app = AppContext::new();

        assert!(app.events.has_source(FRAMEWORK_SOURCE));
        let catalog = app.services.get::<CommandCatalog>(identity::CATALOG).unwrap();
        assert!(Arc::ptr_eq(&catalog, &app.catalog));
        assert!(app.services.contains(identity::ERROR_REPORTER));
        assert!(app.services.contains(identity::MODELS));
    }
}
