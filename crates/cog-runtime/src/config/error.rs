//! Configuration error types.

use std::path::PathBuf;

use cog_core::ErrorKind;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension has no provider.
    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The merged sources do not fit the schema.
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// A required value is absent from every source.
    #[error("Missing required configuration field: {field} (set {env})")]
    MissingField { field: String, env: String },

    /// Two bundles resolve to the same module name.
    #[error("Duplicate bundle name: {0}")]
    DuplicateBundle(String),
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a missing field error naming the variable that supplies it.
    pub fn missing_field(field: impl Into<String>, env: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            env: env.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
