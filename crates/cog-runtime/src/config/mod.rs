//! Configuration for the Cog runtime.
//!
//! Layered TOML/environment loading with validation of the bootstrap
//! credentials, command routing settings, bundles and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{BOOTSTRAP_VARS, ConfigLoader, Profile};
pub use schema::{
    BotConfig, BundleConfig, CogConfig, CommandsConfig, DatabaseConfig, LogFormat, LogLevel,
    LogOutput, LogRotation, LoggingConfig, ModulesConfig, SpanEventConfig,
};
pub use validation::validate_config;
