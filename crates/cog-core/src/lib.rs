//! Cog Core - foundation types for the Cog bot runtime.
//!
//! This crate holds everything the framework layer needs to talk about the
//! outside world without depending on it:
//!
//! - [`ErrorKind`] - the closed failure taxonomy, plus collaborator errors
//! - [`model`] - users, members, channels, guilds and [`Permissions`]
//! - [`ContextStore`] - read-through-create per-guild settings
//! - [`PermissionChecker`] / [`MemberDirectory`] - guard collaborators
//! - [`Responder`] - reply delivery
//! - [`EventBus`] - named event sources
//! - [`Translations`] / [`Translator`] - localized strings
//! - [`CommandPublisher`] / [`RouteRegistrar`] - remote registration seams
//!
//! Concrete platform clients, HTTP servers and databases implement these
//! traits in their own crates.

pub mod context;
pub mod error;
pub mod event;
pub mod guard;
pub mod model;
pub mod remote;
pub mod reply;
pub mod route;
pub mod translation;

pub use context::{ContextRecord, ContextStore, MemoryContextStore};
pub use error::{
    BusError, BusResult, ErrorKind, PublishError, PublishResult, ReplyError, ReplyResult,
    RouteError, RouteResult, StoreError, StoreResult, TranslationError, TranslationResult,
};
pub use event::{
    EventBus, EventPayload, EventSource, FRAMEWORK_SOURCE, ListenOptions, Listener, LocalEmitter,
    SourceHandle, SubscriptionId, listener,
};
pub use guard::{MemberDirectory, MemoryMemberDirectory, PermissionChecker, StaticPermissionChecker};
pub use model::{Channel, ChannelKind, Guild, Member, Permissions, User};
pub use remote::{CommandPublisher, OptionKind, RemoteChoice, RemoteCommand, RemoteOption};
pub use reply::{BoxedResponder, Reply, Responder};
pub use route::{ApiRequest, ApiResponse, Method, RouteDefinition, RouteHandler, RouteRegistrar};
pub use translation::{DEFAULT_LANGUAGE, Translations, Translator};
