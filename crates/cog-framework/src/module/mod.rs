//! Feature modules and their activation.
//!
//! A module is a folder plus a [`Module`] implementation. Activation runs
//! the lifecycle steps in order, each writing into a per-activation
//! [`ModuleScope`]; only a fully successful lifecycle is merged into the
//! application.
//!
//! ```text
//! modules/basics/
//! ├── commands/
//! │   ├── ping.json
//! │   └── help.json
//! ├── translations/
//! │   ├── en.json
//! │   └── es.json
//! └── models/
//!     └── Guild.json
//! ```
//!
//! The default lifecycle loads `commands/*.json`, `translations/<lang>.json`
//! and `models/<Name>.json`; events and routes are registered in code:
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Welcome;
//!
//! #[async_trait]
//! impl Module for Welcome {
//!     async fn register_events(&self, scope: &mut ModuleScope) -> anyhow::Result<()> {
//!         scope.listen("gateway", "memberJoin", listener(|payload| async move { Ok(()) }));
//!         Ok(())
//!     }
//! }
//!
//! activator.queue_activation(ModuleDescriptor::of::<Welcome>("modules/welcome"));
//! activator.resolve_pending().await;
//! ```

mod activator;
mod descriptor;
mod scope;

use std::fmt;

use async_trait::async_trait;

pub use activator::{ModuleActivator, ModuleInstance, UnresolvedModule, UnresolvedReason};
pub use descriptor::{ModuleDescriptor, ModuleFactory, ModuleInit, Predicate};
pub use scope::{ModuleScope, StagedListener};

/// Lifecycle steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStep {
    Commands,
    Events,
    Translations,
    Models,
    Routes,
}

impl LifecycleStep {
    pub const ALL: [LifecycleStep; 5] = [
        LifecycleStep::Commands,
        LifecycleStep::Events,
        LifecycleStep::Translations,
        LifecycleStep::Models,
        LifecycleStep::Routes,
    ];
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Commands => "register commands",
            Self::Events => "register events",
            Self::Translations => "register translations",
            Self::Models => "register models",
            Self::Routes => "register routes",
        })
    }
}

/// Module behavior. Every step has a default.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Loads `commands/*.json` under the module root.
    async fn register_commands(&self, scope: &mut ModuleScope) -> anyhow::Result<()> {
        scope.load_commands_folder();
        Ok(())
    }

    async fn register_events(&self, _scope: &mut ModuleScope) -> anyhow::Result<()> {
        Ok(())
    }

    /// Loads `translations/` under the module root.
    async fn register_translations(&self, scope: &mut ModuleScope) -> anyhow::Result<()> {
        scope.load_translations_folder()?;
        Ok(())
    }

    /// Loads `models/` under the module root.
    async fn register_models(&self, scope: &mut ModuleScope) -> anyhow::Result<()> {
        scope.load_models_folder()?;
        Ok(())
    }

    async fn register_routes(&self, _scope: &mut ModuleScope) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A module that only follows the folder convention.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConventionalModule;

impl Module for ConventionalModule {}
