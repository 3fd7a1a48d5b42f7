//! Trigger routing: from platform input to a running command.
//!
//! Adapters turn platform events into [`Trigger`]s and hand them to
//! [`CommandRouter::route`]:
//!
//! ```rust,ignore
//! let invocation = Invocation::new(user, channel, responder).guild(guild);
//! match router.route(Trigger::message("z-ping", invocation)).await {
//!     DispatchOutcome::Dispatched { command } => debug!(%command, "ran"),
//!     DispatchOutcome::Rejected(reason) => trace!(?reason, "ignored"),
//!     DispatchOutcome::Failed => {}
//! }
//! ```

mod cooldown;
mod dispatch;
mod interaction_id;
mod request;
mod trigger;

pub use cooldown::CooldownTracker;
pub use dispatch::{
    CommandRouter, DispatchOutcome, MODAL_SUBMIT_EVENT, RejectReason, RouterConfig, messages,
};
pub use interaction_id::{InteractionId, InteractionIdGenerator};
pub use request::{ComponentRequest, ExecutionRequest};
pub use trigger::{
    ComponentInteraction, Invocation, ModalSubmit, Origin, StructuredCommand, TextMessage, Trigger,
};
