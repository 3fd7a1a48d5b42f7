//! Unified error types for the Cog core.
//!
//! [`ErrorKind`] is the closed classification every reported failure carries.
//! Framework-level errors (service, catalog, module) live in `cog-framework`
//! and map themselves onto it.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Error Classification
// =============================================================================

/// Closed taxonomy attached to every failure routed through the error reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A service identity was never registered.
    ServiceNotFound,
    /// A service or module dependency chain loops back on itself.
    CircularDependency,
    /// A module failed to construct or run its lifecycle.
    ModuleLoad,
    /// A command manifest could not be read or parsed.
    CommandLoad,
    /// A command handler could not be instantiated.
    CommandInstance,
    /// A command failed while executing.
    CommandRun,
    /// A route could not be registered.
    RouteLoad,
    /// A route handler or a remote API call failed.
    ApiEndpoint,
    /// Anything else.
    Other,
}

impl ErrorKind {
    /// Returns the snake-case label used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceNotFound => "service_not_found",
            Self::CircularDependency => "circular_dependency",
            Self::ModuleLoad => "module_load",
            Self::CommandLoad => "command_load",
            Self::CommandInstance => "command_instance",
            Self::CommandRun => "command_run",
            Self::RouteLoad => "route_load",
            Self::ApiEndpoint => "api_endpoint",
            Self::Other => "other",
        }
    }

    /// Human-readable headline for a failure of this kind.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::ServiceNotFound => "Service could not be resolved",
            Self::CircularDependency => "Circular dependency detected",
            Self::ModuleLoad => "Module failed to load",
            Self::CommandLoad => "Command failed to load",
            Self::CommandInstance => "Command could not be instantiated",
            Self::CommandRun => "Command failed while running",
            Self::RouteLoad => "Route failed to register",
            Self::ApiEndpoint => "API endpoint failed",
            Self::Other => "Unexpected error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Errors raised by a [`ContextStore`](crate::context::ContextStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("context store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("malformed context record '{id}': {reason}")]
    Malformed {
        /// Record identifier.
        id: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors raised by the [`EventBus`](crate::event::EventBus).
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// No emitter is registered under the requested source name.
    #[error("event source '{0}' not found")]
    SourceNotFound(String),
}

/// Errors raised while delivering a reply to the chat platform.
#[derive(Debug, Clone, Error)]
pub enum ReplyError {
    /// The platform refused or failed to deliver the reply.
    #[error("failed to deliver reply: {0}")]
    Delivery(String),
}

/// Errors raised by a [`CommandPublisher`](crate::remote::CommandPublisher).
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// The remote registration endpoint rejected the payload.
    #[error("command registration rejected ({status}): {message}")]
    Rejected {
        /// Status code returned by the endpoint.
        status: u16,
        /// Message returned by the endpoint.
        message: String,
    },

    /// The request never reached the endpoint.
    #[error("command registration transport failed: {0}")]
    Transport(String),
}

/// Errors raised by a [`RouteRegistrar`](crate::route::RouteRegistrar).
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// Another route already claims this method and path.
    #[error("route {method} {path} is already registered")]
    Duplicate {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Route paths must be absolute.
    #[error("route path '{0}' must start with '/'")]
    InvalidPath(String),
}

/// Errors raised while loading translation files.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The file or folder could not be read.
    #[error("failed to read translations from {path}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("failed to parse translations in {path}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for context store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for event bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Result type for reply delivery.
pub type ReplyResult<T> = Result<T, ReplyError>;

/// Result type for remote command publication.
pub type PublishResult<T> = Result<T, PublishError>;

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;

/// Result type for translation loading.
pub type TranslationResult<T> = Result<T, TranslationError>;
