use std::collections::HashMap;
use std::sync::Arc;

use cog_core::{
    BoxedResponder, Channel, ContextRecord, Guild, Member, Reply, ReplyResult, Translator, User,
};

use super::interaction_id::InteractionId;
use super::trigger::Origin;
use crate::command::{Arguments, CommandDefinition, ComponentKind};

/// Everything a command sees when it runs.
pub struct ExecutionRequest {
    pub origin: Origin,
    pub command: Arc<CommandDefinition>,
    pub args: Arguments,
    /// Raw tokens after the command (and sub-command) name; empty for
    /// structured triggers.
    pub tokens: Vec<String>,
    pub context: ContextRecord,
    /// Bound to the command's namespace and the context language.
    pub translator: Translator,
    pub user: User,
    pub member: Option<Member>,
    pub channel: Channel,
    pub guild: Option<Guild>,
    pub responder: BoxedResponder,
}

impl ExecutionRequest {
    pub async fn reply(&self, reply: impl Into<Reply> + Send) -> ReplyResult<()> {
        self.responder.reply(reply.into()).await
    }

    /// Localized string under the command namespace (`$key` for global keys).
    pub fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.translator.get(key, params)
    }
}

/// Everything a component binding sees when it runs.
pub struct ComponentRequest {
    pub kind: ComponentKind,
    pub command: Arc<CommandDefinition>,
    pub interaction_id: InteractionId,
    pub values: Vec<String>,
    pub fields: HashMap<String, String>,
    pub context: ContextRecord,
    pub translator: Translator,
    pub user: User,
    pub member: Option<Member>,
    pub channel: Channel,
    pub guild: Option<Guild>,
    pub responder: BoxedResponder,
}

impl ComponentRequest {
    pub async fn reply(&self, reply: impl Into<Reply> + Send) -> ReplyResult<()> {
        self.responder.reply(reply.into()).await
    }

    pub fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.translator.get(key, params)
    }
}
