//! Argument schema and materialized argument values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cog_core::{Member, User};
use serde::{Deserialize, Serialize};

/// Declared type of a command argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArgKind {
    String,
    User,
    Member,
    Channel,
    Role,
    /// A type name with no coercion; skipped at dispatch, rejected when publishing.
    Other(String),
}

impl ArgKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::User => "user",
            Self::Member => "member",
            Self::Channel => "channel",
            Self::Role => "role",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ArgKind {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "string" => Self::String,
            "user" => Self::User,
            "member" => Self::Member,
            "channel" => Self::Channel,
            "role" => Self::Role,
            _ => Self::Other(value),
        }
    }
}

impl From<ArgKind> for String {
    fn from(kind: ArgKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable value of an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub value: String,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Choices offered for an argument: fixed, or computed when publishing.
#[derive(Clone)]
pub enum Choices {
    Static(Vec<Choice>),
    Dynamic(Arc<dyn Fn() -> Vec<Choice> + Send + Sync>),
}

impl Choices {
    /// Returns the current choice list.
    pub fn resolve(&self) -> Vec<Choice> {
        match self {
            Self::Static(choices) => choices.clone(),
            Self::Dynamic(provider) => provider(),
        }
    }
}

impl fmt::Debug for Choices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(choices) => f.debug_tuple("Static").field(choices).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// One entry of a command's ordered argument schema.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    name: String,
    kind: ArgKind,
    optional: bool,
    choices: Option<Choices>,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            choices: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::String)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::User)
    }

    pub fn member(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::Member)
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::Channel)
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::Role)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = Some(Choices::Static(choices));
        self
    }

    pub fn dynamic_choices<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Vec<Choice> + Send + Sync + 'static,
    {
        self.choices = Some(Choices::Dynamic(Arc::new(provider)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ArgKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn choice_set(&self) -> Option<&Choices> {
        self.choices.as_ref()
    }
}

// =============================================================================
// Materialized values
// =============================================================================

/// A coerced argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    User(User),
    Member(Member),
    /// Channel id.
    Channel(String),
    /// Role id.
    Role(String),
}

/// Canonical argument map, keyed by declared name (or positional index).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: HashMap<String, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    /// Text of a string argument.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            ArgValue::String(text) => Some(text),
            _ => None,
        }
    }

    /// User of a user or member argument.
    pub fn user(&self, key: &str) -> Option<&User> {
        match self.values.get(key)? {
            ArgValue::User(user) => Some(user),
            ArgValue::Member(member) => Some(&member.user),
            _ => None,
        }
    }

    pub fn member(&self, key: &str) -> Option<&Member> {
        match self.values.get(key)? {
            ArgValue::Member(member) => Some(member),
            _ => None,
        }
    }

    /// Id of a channel or role argument.
    pub fn id(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            ArgValue::Channel(id) | ArgValue::Role(id) => Some(id),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
