//! Inbound triggers, as handed to the router by a platform adapter.

use std::collections::HashMap;
use std::fmt;

use cog_core::{BoxedResponder, Channel, Guild, Member, User};

use crate::command::ComponentKind;

/// Which input surface produced a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Prefixed free text.
    Text,
    /// A structured command interaction.
    Structured,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Structured => "structured",
        })
    }
}

/// Who triggered, where, and how to answer.
#[derive(Clone)]
pub struct Invocation {
    pub user: User,
    pub member: Option<Member>,
    pub channel: Channel,
    pub guild: Option<Guild>,
    pub responder: BoxedResponder,
}

impl Invocation {
    pub fn new(user: User, channel: Channel, responder: BoxedResponder) -> Self {
        Self {
            user,
            member: None,
            channel,
            guild: None,
            responder,
        }
    }

    pub fn member(mut self, member: Member) -> Self {
        self.member = Some(member);
        self
    }

    pub fn guild(mut self, guild: Guild) -> Self {
        self.guild = Some(guild);
        self
    }

    pub fn guild_id(&self) -> Option<&str> {
        self.guild
            .as_ref()
            .map(|g| g.id.as_str())
            .or(self.channel.guild_id.as_deref())
    }

    /// Context record id: the guild, or the channel outside guilds.
    pub fn context_id(&self) -> &str {
        self.guild_id().unwrap_or(&self.channel.id)
    }

    pub fn is_guild_owner(&self) -> bool {
        self.guild.as_ref().is_some_and(|g| g.owner_id == self.user.id)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("user", &self.user.id)
            .field("channel", &self.channel.id)
            .field("guild", &self.guild_id())
            .finish_non_exhaustive()
    }
}

/// A chat message that may carry a prefixed command.
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub content: String,
    pub invocation: Invocation,
}

/// A structured command interaction.
#[derive(Debug, Clone)]
pub struct StructuredCommand {
    pub name: String,
    pub subcommand: Option<String>,
    /// Option values by name, as raw strings (ids for users, channels, roles).
    pub options: HashMap<String, String>,
    pub invocation: Invocation,
}

impl StructuredCommand {
    pub fn new(name: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            name: name.into(),
            subcommand: None,
            options: HashMap::new(),
            invocation,
        }
    }

    pub fn subcommand(mut self, name: impl Into<String>) -> Self {
        self.subcommand = Some(name.into());
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// A button press, select-menu choice or modal submission.
#[derive(Debug, Clone)]
pub struct ComponentInteraction {
    pub kind: ComponentKind,
    /// `command.id.params...`
    pub custom_id: String,
    /// Selected values (select menus).
    pub values: Vec<String>,
    /// Submitted fields (modals).
    pub fields: HashMap<String, String>,
    pub invocation: Invocation,
}

impl ComponentInteraction {
    pub fn new(kind: ComponentKind, custom_id: impl Into<String>, invocation: Invocation) -> Self {
        Self {
            kind,
            custom_id: custom_id.into(),
            values: Vec::new(),
            fields: HashMap::new(),
            invocation,
        }
    }

    pub fn values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Any input the router handles.
#[derive(Debug, Clone)]
pub enum Trigger {
    Message(TextMessage),
    Command(StructuredCommand),
    Component(ComponentInteraction),
}

impl Trigger {
    pub fn message(content: impl Into<String>, invocation: Invocation) -> Self {
        Self::Message(TextMessage {
            content: content.into(),
            invocation,
        })
    }

    pub fn invocation(&self) -> &Invocation {
        match self {
            Self::Message(m) => &m.invocation,
            Self::Command(c) => &c.invocation,
            Self::Component(c) => &c.invocation,
        }
    }
}

impl From<StructuredCommand> for Trigger {
    fn from(command: StructuredCommand) -> Self {
        Self::Command(command)
    }
}

impl From<ComponentInteraction> for Trigger {
    fn from(interaction: ComponentInteraction) -> Self {
        Self::Component(interaction)
    }
}

/// Payload of the `modalSubmit` framework event, published for modal
/// submissions whose command has no modal binding.
#[derive(Debug, Clone)]
pub struct ModalSubmit {
    pub command: String,
    pub custom_id: String,
    /// `custom_id` split on `.`.
    pub path: Vec<String>,
    pub fields: HashMap<String, String>,
    pub user_id: String,
    pub channel_id: String,
}
