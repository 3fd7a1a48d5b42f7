//! In-process route table.
//!
//! [`RouteTable`] is the registrar modules hand their routes to. An HTTP
//! server adapter forwards requests to [`RouteTable::invoke`]; handler
//! failures never escape it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use cog_core::{
    ApiRequest, ApiResponse, Method, RouteDefinition, RouteError, RouteRegistrar, RouteResult,
};
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::reporter::{ErrorReporter, ReportContext};

/// Registered routes, matched in registration order.
pub struct RouteTable {
    routes: RwLock<Vec<RouteDefinition>>,
    reporter: Arc<ErrorReporter>,
}

impl RouteTable {
    pub fn new(reporter: Arc<ErrorReporter>) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            reporter,
        }
    }

    /// Registers every route or none of them.
    pub fn register_all(&self, routes: Vec<RouteDefinition>) -> RouteResult<()> {
        let mut table = self.routes.write();
        for (i, route) in routes.iter().enumerate() {
            validate_path(&route.path)?;
            let clash = table
                .iter()
                .chain(routes[..i].iter())
                .any(|existing| conflicts(existing, route));
            if clash {
                return Err(RouteError::Duplicate {
                    method: route.method.to_string(),
                    path: route.path.clone(),
                });
            }
        }
        for route in &routes {
            info!(route = %route.label(), "Registered route");
        }
        table.extend(routes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// `METHOD /path` labels, in registration order.
    pub fn labels(&self) -> Vec<String> {
        self.routes.read().iter().map(RouteDefinition::label).collect()
    }

    /// Runs the handler matching the request.
    ///
    /// Unknown routes answer 404. Handler errors and panics are reported as
    /// `ApiEndpoint` failures and answer 500.
    pub async fn invoke(&self, request: ApiRequest) -> ApiResponse {
        let handler = self
            .routes
            .read()
            .iter()
            .find(|route| route.method.matches(request.method) && route.path == request.path)
            .map(|route| Arc::clone(&route.handler));
        let Some(handler) = handler else {
            debug!(method = %request.method, path = %request.path, "No route matched");
            return ApiResponse::not_found();
        };

        let method = request.method;
        let path = request.path.clone();
        let result = AssertUnwindSafe(handler.handle(request)).catch_unwind().await;
        let err = match result {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err,
            Err(_) => anyhow::anyhow!("route handler panicked"),
        };
        self.reporter
            .report(&err, ReportContext::api_endpoint(method, &path));
        ApiResponse::internal_error()
    }
}

impl RouteRegistrar for RouteTable {
    fn register_route(&self, route: RouteDefinition) -> RouteResult<()> {
        self.register_all(vec![route])
    }
}

fn conflicts(a: &RouteDefinition, b: &RouteDefinition) -> bool {
    a.path == b.path && (a.method == b.method || a.method == Method::All || b.method == Method::All)
}

fn validate_path(path: &str) -> RouteResult<()> {
    if path.starts_with('/') && !path.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(RouteError::InvalidPath(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemorySink;
    use cog_core::ErrorKind;
    use serde_json::json;

    fn table() -> (RouteTable, Arc<MemorySink>) {
        let reporter = Arc::new(ErrorReporter::new());
        let sink = Arc::new(MemorySink::new());
        reporter.add_sink(sink.clone());
        (RouteTable::new(reporter), sink)
    }

    fn status(
        _request: ApiRequest,
    ) -> impl std::future::Future<Output = anyhow::Result<ApiResponse>> {
        async { Ok(ApiResponse::ok(json!({ "up": true }))) }
    }

    #[tokio::test]
    async fn test_invoke_registered_route() {
        let (routes, _) = table();
        routes
            .register_route(RouteDefinition::new(Method::Get, "/status", status))
            .unwrap();

        let response = routes.invoke(ApiRequest::new(Method::Get, "/status")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["up"], true);

        let missing = routes.invoke(ApiRequest::new(Method::Post, "/status")).await;
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn test_failing_handler_answers_500_and_reports() {
        let (routes, sink) = table();
        routes
            .register_route(RouteDefinition::new(Method::Post, "/fail", |_req: ApiRequest| async {
                Err::<ApiResponse, _>(anyhow::anyhow!("bad payload"))
            }))
            .unwrap();

        let response = routes.invoke(ApiRequest::new(Method::Post, "/fail")).await;

        assert_eq!(response.status, 500);
        assert_eq!(sink.count(ErrorKind::ApiEndpoint), 1);
        assert_eq!(sink.reports()[0].subject.as_deref(), Some("POST /fail"));
    }

    #[test]
    fn test_register_all_is_atomic() {
        let (routes, _) = table();
        routes
            .register_route(RouteDefinition::new(Method::Get, "/a", status))
            .unwrap();

        let err = routes
            .register_all(vec![
                RouteDefinition::new(Method::Get, "/b", status),
                RouteDefinition::new(Method::All, "/a", status),
            ])
            .unwrap_err();

        assert!(matches!(err, RouteError::Duplicate { .. }));
        assert_eq!(routes.labels(), vec!["GET /a".to_string()]);
    }

    #[test]
    fn test_invalid_path_rejected() {
        let (routes, _) = table();
        let err = routes
            .register_route(RouteDefinition::new(Method::Get, "status", status))
            .unwrap_err();
        assert!(matches!(err, RouteError::InvalidPath(_)));
    }
}
