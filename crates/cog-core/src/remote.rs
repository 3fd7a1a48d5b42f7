//! Wire schema for remote command registration.
//!
//! The command catalog projects its structured-capable commands into
//! [`RemoteCommand`]s; a [`CommandPublisher`] ships them to the platform's
//! registration endpoint. The transport itself is out of scope here.

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::error::PublishResult;

/// Option kind codes understood by the registration endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OptionKind {
    SubCommand = 1,
    String = 3,
    User = 6,
    Channel = 7,
    Role = 8,
}

impl Serialize for OptionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// A fixed choice offered for an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteChoice {
    pub name: String,
    pub value: String,
}

/// One option of a remote command (an argument or a nested sub-command).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteOption {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<RemoteChoice>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<RemoteOption>,
}

/// A top-level command as published to the platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCommand {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<RemoteOption>,
}

/// Ships remote command definitions to the platform.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    async fn publish(&self, commands: &[RemoteCommand]) -> PublishResult<()>;
}
