//! HTTP route contracts modules register against.
//!
//! The HTTP server is an external collaborator; modules only see
//! [`RouteDefinition`] and the [`RouteRegistrar`] that accepts it.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::RouteResult;

/// HTTP method a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    /// Matches every method.
    All,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::All => "ALL",
        }
    }

    /// Returns `true` if a route declared with `self` answers `request`.
    pub fn matches(&self, request: Method) -> bool {
        *self == Method::All || *self == request
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound HTTP request, already decoded by the server.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            body: Value::Null,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// The response a route handler produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// `200 OK` with a JSON body.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn not_found() -> Self {
        Self::with_status(404, json!({ "error": "not found" }))
    }

    pub fn internal_error() -> Self {
        Self::with_status(500, json!({ "error": "internal server error" }))
    }
}

/// Handles requests for one route.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse>;
}

#[async_trait]
impl<F, Fut> RouteHandler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
{
    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
        (self)(request).await
    }
}

/// A method + path bound to a handler.
#[derive(Clone)]
pub struct RouteDefinition {
    pub method: Method,
    pub path: String,
    pub handler: Arc<dyn RouteHandler>,
}

impl RouteDefinition {
    pub fn new<H: RouteHandler + 'static>(
        method: Method,
        path: impl Into<String>,
        handler: H,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
        }
    }

    /// `"GET /status"`, used in logs and error reports.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Accepts route registrations on behalf of an HTTP server.
pub trait RouteRegistrar: Send + Sync {
    fn register_route(&self, route: RouteDefinition) -> RouteResult<()>;
}
