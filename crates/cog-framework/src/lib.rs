//! # Cog Framework
//!
//! The moving parts of the Cog bot runtime, built on the seams declared in
//! `cog-core`.
//!
//! This layer provides:
//! - [`ServiceRegistry`] - dependency-injected services with cycle detection
//! - [`ModuleActivator`] - requirement-driven, all-or-nothing module activation
//! - [`CommandCatalog`] - manifest-backed command index with hot reload
//! - [`CommandRouter`] - guards, argument materialization and isolated dispatch
//! - [`RouteTable`] - in-process API routes
//! - [`ModelRegistry`] - data model schemas merged across modules
//! - [`ErrorReporter`] - classified failure reporting
//!
//! [`AppContext`] bundles the shared registries; the runtime builds one per
//! process.

pub mod app;
pub mod command;
pub mod error;
pub mod model;
pub mod module;
pub mod reporter;
pub mod route;
pub mod router;
pub mod service;

pub use app::AppContext;
pub use command::{
    ArgKind, ArgValue, Arguments, ArgumentSpec, Choice, Command, CommandCatalog, CommandDefinition,
    ComponentHandler, ComponentKind, FolderWatch, Guards, HandlerRegistry, TriggerMode,
};
pub use error::{
    CatalogError, CatalogResult, ModuleError, ModuleResult, ServiceError, ServiceResult,
};
pub use model::{ModelDefinition, ModelRegistry};
pub use module::{
    LifecycleStep, Module, ModuleActivator, ModuleDescriptor, ModuleInit, ModuleScope,
    UnresolvedModule, UnresolvedReason,
};
pub use reporter::{ErrorReporter, MemorySink, Report, ReportContext, ReportSink};
pub use route::RouteTable;
pub use router::{
    CommandRouter, ComponentInteraction, ComponentRequest, DispatchOutcome, ExecutionRequest,
    InteractionId, InteractionIdGenerator, Invocation, Origin, RejectReason, RouterConfig,
    StructuredCommand, Trigger,
};
pub use service::{ResolvedDependencies, ServiceRegistry};
