//! Error types for the Cog framework.
//!
//! Each enum maps onto the core [`ErrorKind`] taxonomy through `kind()`, so
//! the [`ErrorReporter`](crate::reporter::ErrorReporter) can classify any of
//! them without knowing where they came from.

use std::path::PathBuf;

use cog_core::{BusError, ErrorKind, RouteError};
use thiserror::Error;

use crate::module::{LifecycleStep, UnresolvedReason};

// =============================================================================
// Service Errors
// =============================================================================

/// Errors raised while resolving services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The identity was never registered.
    #[error("service '{identity}' is not registered")]
    NotFound {
        identity: String,
        /// The service whose dependency list named it, if any.
        required_by: Option<String>,
    },

    /// Resolution re-entered an identity it was already resolving.
    #[error("circular service dependency: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// The factory returned an error.
    #[error("failed to construct service '{identity}'")]
    Construction {
        identity: String,
        #[source]
        source: anyhow::Error,
    },

    /// The stored instance is not of the requested type.
    #[error("service '{identity}' is not a {expected}")]
    TypeMismatch {
        identity: String,
        expected: &'static str,
    },
}

impl ServiceError {
    pub fn not_found(identity: impl Into<String>, required_by: Option<&str>) -> Self {
        Self::NotFound {
            identity: identity.into(),
            required_by: required_by.map(str::to_string),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::TypeMismatch { .. } => ErrorKind::ServiceNotFound,
            Self::CircularDependency { .. } => ErrorKind::CircularDependency,
            Self::Construction { .. } => ErrorKind::Other,
        }
    }
}

// =============================================================================
// Catalog Errors
// =============================================================================

/// Errors raised while loading, watching or projecting commands.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A commands folder or manifest could not be read.
    #[error("failed to read command manifest {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest is not valid JSON for the manifest schema.
    #[error("invalid command manifest {path}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No handler factory is registered under the manifest's identity.
    #[error("no command handler registered as '{handler}' (manifest {path})")]
    UnknownHandler { path: PathBuf, handler: String },

    /// The handler factory returned an error.
    #[error("command handler '{handler}' could not be instantiated")]
    HandlerFailed {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    /// An argument type has no remote option kind.
    #[error("command '{command}' argument '{argument}' has unsupported type '{kind}'")]
    UnsupportedArgumentKind {
        command: String,
        argument: String,
        kind: String,
    },

    /// The folder watcher could not be started.
    #[error("failed to watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ManifestRead { .. }
            | Self::ManifestParse { .. }
            | Self::UnsupportedArgumentKind { .. } => ErrorKind::CommandLoad,
            Self::UnknownHandler { .. } | Self::HandlerFailed { .. } => ErrorKind::CommandInstance,
            Self::Watch { .. } => ErrorKind::Other,
        }
    }
}

// =============================================================================
// Module Errors
// =============================================================================

/// Errors raised while activating modules.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A module with the same name is already active.
    #[error("module '{module}' is already active")]
    AlreadyActive { module: String },

    /// The module factory returned an error.
    #[error("module '{module}' could not be constructed")]
    Construction {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    /// A lifecycle step returned an error.
    #[error("module '{module}' failed to {step}")]
    Lifecycle {
        module: String,
        step: LifecycleStep,
        #[source]
        source: anyhow::Error,
    },

    /// A listener targets an event source that does not exist.
    #[error("module '{module}' subscribes to a missing event source")]
    Event {
        module: String,
        #[source]
        source: BusError,
    },

    /// A route conflicts with an existing registration.
    #[error("module '{module}' could not register its routes")]
    Route {
        module: String,
        #[source]
        source: RouteError,
    },

    /// Resolution finished with the module still pending.
    #[error("module '{module}' could not be activated: {reason}")]
    Unresolved {
        module: String,
        reason: UnresolvedReason,
    },
}

impl ModuleError {
    pub fn module(&self) -> &str {
        match self {
            Self::AlreadyActive { module }
            | Self::Construction { module, .. }
            | Self::Lifecycle { module, .. }
            | Self::Event { module, .. }
            | Self::Route { module, .. }
            | Self::Unresolved { module, .. } => module,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Lifecycle {
                step: LifecycleStep::Commands,
                ..
            } => ErrorKind::CommandLoad,
            Self::Lifecycle {
                step: LifecycleStep::Routes,
                ..
            }
            | Self::Route { .. } => ErrorKind::RouteLoad,
            Self::Unresolved {
                reason: UnresolvedReason::CircularDependency(_),
                ..
            } => ErrorKind::CircularDependency,
            _ => ErrorKind::ModuleLoad,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for service resolution.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for module activation.
pub type ModuleResult<T> = Result<T, ModuleError>;
