//! Runtime error types.

use cog_core::{ErrorKind, PublishError};
use cog_framework::CatalogError;
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur while starting or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote command definitions could not be built.
    #[error("Failed to build remote command definitions: {0}")]
    RemoteDefinitions(#[source] CatalogError),

    /// The command publisher refused the definitions.
    #[error("Failed to publish commands: {0}")]
    Publish(#[from] PublishError),

    /// A shutdown signal handler could not be installed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    /// An unrecoverable failure was reported.
    #[error("Runtime terminated after an unrecoverable failure")]
    Terminated,
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteDefinitions(err) => err.kind(),
            _ => ErrorKind::Other,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
