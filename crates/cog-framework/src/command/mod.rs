//! Commands: definitions, manifests, the catalog and its projections.
//!
//! - [`CommandDefinition`] - metadata plus an `Arc<dyn Command>` handler
//! - [`HandlerRegistry`] - code-side factories bound to JSON manifests
//! - [`CommandCatalog`] - the live index, with folder loading, hot reload
//!   and remote definition building
//! - [`split_command_line`] / [`nearest`] - text input helpers
//!
//! # Example
//!
//! ```rust,ignore
//! struct Ping;
//!
//! #[async_trait]
//! impl Command for Ping {
//!     async fn execute(&self, req: &ExecutionRequest) -> anyhow::Result<()> {
//!         req.reply(req.t("pong", &[])).await?;
//!         Ok(())
//!     }
//! }
//!
//! catalog.set(CommandDefinition::new(Ping).alias("p").allow_dm());
//! ```

mod args;
mod catalog;
mod correct;
mod definition;
mod manifest;
mod remote;
mod split;
mod watch;

pub use args::{ArgKind, ArgValue, Arguments, ArgumentSpec, Choice, Choices};
pub use catalog::{CommandCatalog, LoadOutcome};
pub use correct::{edit_distance, nearest};
pub use definition::{
    Command, CommandBinds, CommandDefinition, ComponentHandler, ComponentKind, Guards, TriggerMode,
    command_key,
};
pub use manifest::{
    ArgumentManifest, CommandManifest, FolderLoad, HandlerFactory, HandlerRegistry, is_manifest,
    load_manifest, load_manifest_dir,
};
pub use split::split_command_line;
pub use watch::FolderWatch;
