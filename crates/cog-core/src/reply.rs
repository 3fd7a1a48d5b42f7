//! Outbound replies to the invoking user.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReplyResult;

/// A reply sent back to the channel a trigger came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoking user, where the platform supports it.
    pub ephemeral: bool,
}

impl Reply {
    /// A plain, publicly visible reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    /// A reply only the invoking user can see.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

impl From<&str> for Reply {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for Reply {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

/// Delivers replies for one inbound trigger.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn reply(&self, reply: Reply) -> ReplyResult<()>;
}

/// Shared handle to a [`Responder`].
pub type BoxedResponder = Arc<dyn Responder>;
