//! Cog Runtime - bootstrap layer for the Cog bot runtime.
//!
//! This crate provides:
//! - Layered configuration (`CogConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`)
//! - Runtime orchestration (`CogRuntime`)
//!
//! ```ignore
//! use cog_runtime::CogRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Reads cog.toml, COG_* variables and BOT_TOKEN / BOT_CLIENT_ID /
//!     // DATABASE_URI / BOT_PREFIX
//!     let runtime = CogRuntime::builder().build()?;
//!
//!     runtime.handlers().register_default::<Ping>("ping");
//!
//!     // Activates modules/ and runs until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! Every sub-folder of `modules.dir` is activated as a conventional module
//! unless an explicit descriptor or a bundle already claims its name.
//! Bundles come from `[[modules.bundles]]` tables:
//!
//! ```toml
//! [[modules.bundles]]
//! path = "vendor/music"
//! name = "jukebox"
//! params = { volume = 3 }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{CogConfig, ConfigError, ConfigLoader, ConfigResult, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CogRuntime, RuntimeBuilder, StartupSummary};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
