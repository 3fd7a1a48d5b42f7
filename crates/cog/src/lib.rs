//! # Cog
//!
//! A modular chat bot runtime. Commands are declared as JSON manifests inside
//! module folders and bound to handlers registered in code.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────────┐     ┌─────────────────────────────────┐
//! │ Platform │────▶│ CommandRouter │────▶│ guards ─▶ cooldown ─▶ args      │──▶ Command
//! │ triggers │     │               │     └─────────────────────────────────┘
//! └──────────┘     └───────────────┘
//!                         ▲
//!                  ┌──────┴───────┐     ┌─────────────────────────────────┐
//!                  │CommandCatalog│◀────│ ModuleActivator (per module:    │
//!                  └──────────────┘     │ commands, events, translations, │
//!                                       │ models, routes)                 │
//!                                       └─────────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, activates modules, owns the router
//! - **Modules**: folders with `commands/`, `translations/` and `models/`,
//!   plus optional code hooks for events and API routes
//! - **Router**: turns messages, structured commands and component
//!   interactions into guarded, isolated handler calls
//! - **Services**: shared instances resolved by identity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cog::prelude::*;
//!
//! #[derive(Default)]
//! struct Ping;
//!
//! #[async_trait]
//! impl Command for Ping {
//!     async fn execute(&self, request: &ExecutionRequest) -> anyhow::Result<()> {
//!         request.reply("pong").await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CogRuntime::builder().build()?;
//!     runtime.handlers().register_default::<Ping>("ping");
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `json-log`: JSON log output

pub use cog_core as core;
pub use cog_framework as framework;
pub use cog_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cog::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use cog_runtime::{CogConfig, CogRuntime, RuntimeBuilder};

    // Modules
    pub use cog_framework::{Module, ModuleDescriptor, ModuleInit, ModuleScope};

    // Commands and requests
    pub use cog_framework::{
        ArgValue, Command, CommandDefinition, ComponentHandler, ComponentKind, ComponentRequest,
        ExecutionRequest, TriggerMode,
    };

    // Platform input
    pub use cog_framework::{ComponentInteraction, Invocation, StructuredCommand, Trigger};

    // Core model and seams
    pub use cog_core::{
        Channel, CommandPublisher, ContextStore, Guild, Member, Permissions, Reply, Responder,
        User,
    };

    pub use async_trait::async_trait;
}
