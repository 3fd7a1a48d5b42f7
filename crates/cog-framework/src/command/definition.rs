//! Command definitions and the handler traits behind them.

use std::any::type_name;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cog_core::Permissions;
use serde::{Deserialize, Serialize};

use super::args::ArgumentSpec;
use crate::router::{ComponentRequest, ExecutionRequest, Origin};

/// Which inputs may trigger a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Prefixed free text only.
    #[serde(alias = "prefix")]
    Text,
    /// Structured interactions only.
    #[serde(alias = "slash")]
    Structured,
    /// Both, through [`Command::execute`].
    #[default]
    Any,
    /// Both, through the origin-specific entry points.
    Separated,
}

impl TriggerMode {
    pub fn accepts(self, origin: Origin) -> bool {
        match self {
            Self::Text => origin == Origin::Text,
            Self::Structured => origin == Origin::Structured,
            Self::Any | Self::Separated => true,
        }
    }

    /// Whether the command is projected into remote definitions.
    pub fn publishes_structured(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// Pre-execution checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guards {
    pub admin_only: bool,
    pub nsfw: bool,
    /// Allowed in direct messages.
    pub dm: bool,
    pub permissions: Permissions,
}

/// Command behavior.
///
/// `execute` is the single entry point for commands in [`TriggerMode::Any`];
/// [`TriggerMode::Separated`] commands override the origin-specific methods.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    async fn execute(&self, request: &ExecutionRequest) -> anyhow::Result<()>;

    async fn execute_text(&self, request: &ExecutionRequest) -> anyhow::Result<()> {
        self.execute(request).await
    }

    async fn execute_structured(&self, request: &ExecutionRequest) -> anyhow::Result<()> {
        self.execute(request).await
    }
}

/// Handler for a component interaction bound to a command.
#[async_trait]
pub trait ComponentHandler: Send + Sync + 'static {
    async fn handle(&self, request: &ComponentRequest) -> anyhow::Result<()>;
}

/// Interactive component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Button,
    SelectMenu,
    Modal,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Button => "button",
            Self::SelectMenu => "select_menu",
            Self::Modal => "modal",
        })
    }
}

/// Optional component bindings of a command.
#[derive(Clone, Default)]
pub struct CommandBinds {
    pub button: Option<Arc<dyn ComponentHandler>>,
    pub select_menu: Option<Arc<dyn ComponentHandler>>,
    pub modal: Option<Arc<dyn ComponentHandler>>,
}

impl CommandBinds {
    pub fn get(&self, kind: ComponentKind) -> Option<&Arc<dyn ComponentHandler>> {
        match kind {
            ComponentKind::Button => self.button.as_ref(),
            ComponentKind::SelectMenu => self.select_menu.as_ref(),
            ComponentKind::Modal => self.modal.as_ref(),
        }
    }
}

/// A registered command.
///
/// Definitions are immutable once in the catalog; hot reload replaces the
/// whole `Arc`.
#[derive(Clone)]
pub struct CommandDefinition {
    name: String,
    aliases: Vec<String>,
    categories: Vec<String>,
    examples: Vec<String>,
    description: Option<String>,
    args: Vec<ArgumentSpec>,
    guards: Guards,
    cooldown: Duration,
    mode: TriggerMode,
    hidden: bool,
    parent: Option<String>,
    handler: Arc<dyn Command>,
    binds: CommandBinds,
    source: Option<PathBuf>,
}

impl CommandDefinition {
    /// Creates a definition named after the handler type (`PingCommand` →
    /// `pingcommand`, `mod::Ping` → `ping`).
    pub fn new<C: Command>(handler: C) -> Self {
        Self::from_handler(default_name::<C>(), Arc::new(handler))
    }

    pub fn from_handler(name: impl Into<String>, handler: Arc<dyn Command>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            aliases: Vec::new(),
            categories: Vec::new(),
            examples: Vec::new(),
            description: None,
            args: Vec::new(),
            guards: Guards::default(),
            cooldown: Duration::ZERO,
            mode: TriggerMode::default(),
            hidden: false,
            parent: None,
            handler,
            binds: CommandBinds::default(),
            source: None,
        }
    }

    // ─── Builder ─────────────────────────────────────────────────────────────

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into().to_lowercase();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(|a| a.into().to_lowercase()).collect();
        self
    }

    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn arg(mut self, arg: ArgumentSpec) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: Vec<ArgumentSpec>) -> Self {
        self.args = args;
        self
    }

    pub fn guards(mut self, guards: Guards) -> Self {
        self.guards = guards;
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.guards.admin_only = true;
        self
    }

    pub fn nsfw(mut self) -> Self {
        self.guards.nsfw = true;
        self
    }

    pub fn allow_dm(mut self) -> Self {
        self.guards.dm = true;
        self
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.guards.permissions = permissions;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn mode(mut self, mode: TriggerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into().to_lowercase());
        self
    }

    pub fn bind(mut self, kind: ComponentKind, handler: impl ComponentHandler) -> Self {
        let handler: Arc<dyn ComponentHandler> = Arc::new(handler);
        match kind {
            ComponentKind::Button => self.binds.button = Some(handler),
            ComponentKind::SelectMenu => self.binds.select_menu = Some(handler),
            ComponentKind::Modal => self.binds.modal = Some(handler),
        }
        self
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn command_name(&self) -> &str {
        &self.name
    }

    pub fn alias_list(&self) -> &[String] {
        &self.aliases
    }

    pub fn category_list(&self) -> &[String] {
        &self.categories
    }

    pub fn example_list(&self) -> &[String] {
        &self.examples
    }

    pub fn description_override(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn arg_specs(&self) -> &[ArgumentSpec] {
        &self.args
    }

    pub fn guard_set(&self) -> &Guards {
        &self.guards
    }

    pub fn cooldown_period(&self) -> Duration {
        self.cooldown
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.mode
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn handler(&self) -> &Arc<dyn Command> {
        &self.handler
    }

    pub fn binds(&self) -> &CommandBinds {
        &self.binds
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Catalog key: `name`, or `parent name` for sub-commands.
    pub fn key(&self) -> String {
        command_key(self.parent.as_deref(), &self.name)
    }

    /// Translation namespace: `command.name` or `command.parent.name`.
    pub fn namespace(&self) -> String {
        match &self.parent {
            Some(parent) => format!("command.{parent}.{}", self.name),
            None => format!("command.{}", self.name),
        }
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("aliases", &self.aliases)
            .field("mode", &self.mode)
            .field("guards", &self.guards)
            .field("args", &self.args.len())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Builds a catalog key from an optional parent and a name.
pub fn command_key(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{} {}", parent.to_lowercase(), name.to_lowercase()),
        None => name.to_lowercase(),
    }
}

fn default_name<C>() -> String {
    let full = type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    #[async_trait]
    impl Command for Ping {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_name_from_type() {
        let def = CommandDefinition::new(Ping);
        assert_eq!(def.command_name(), "ping");
        assert_eq!(def.key(), "ping");
        assert_eq!(def.namespace(), "command.ping");
        assert_eq!(def.trigger_mode(), TriggerMode::Any);
        assert!(!def.guard_set().dm);
    }

    #[test]
    fn test_subcommand_key_and_namespace() {
        let def = CommandDefinition::new(Ping).name("Add").parent("Role");
        assert_eq!(def.key(), "role add");
        assert_eq!(def.namespace(), "command.role.add");
    }

    #[test]
    fn test_trigger_mode_acceptance() {
        assert!(TriggerMode::Text.accepts(Origin::Text));
        assert!(!TriggerMode::Text.accepts(Origin::Structured));
        assert!(!TriggerMode::Structured.accepts(Origin::Text));
        assert!(TriggerMode::Separated.accepts(Origin::Structured));
        assert!(!TriggerMode::Text.publishes_structured());
    }

    #[test]
    fn test_trigger_mode_aliases() {
        let mode: TriggerMode = serde_json::from_str(r#""slash""#).unwrap();
        assert_eq!(mode, TriggerMode::Structured);
        let mode: TriggerMode = serde_json::from_str(r#""prefix""#).unwrap();
        assert_eq!(mode, TriggerMode::Text);
    }

    #[test]
    fn test_guards_deserialize_with_defaults() {
        let guards: Guards =
            serde_json::from_str(r#"{"admin_only": true, "permissions": 8}"#).unwrap();
        assert!(guards.admin_only);
        assert!(!guards.dm);
        assert!(guards.permissions.contains(Permissions::ADMINISTRATOR));
    }
}
