//! The unified command pipeline.
//!
//! Every [`Trigger`] runs through the same stages:
//!
//! 1. Resolve the context record (fetch-or-create)
//! 2. Resolve the command: by name for structured input; by prefix, split,
//!    alias and typo correction for text
//! 3. Run the guards: trigger mode, direct messages, permissions, nsfw,
//!    cooldown
//! 4. Materialize arguments against the command's schema
//! 5. Dispatch, isolating errors and panics
//!
//! The router never propagates a command failure: every trigger ends in a
//! [`DispatchOutcome`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cog_core::{
    ContextRecord, ContextStore, ErrorKind, EventBus, EventPayload, FRAMEWORK_SOURCE,
    MemberDirectory, PermissionChecker, Permissions, Reply, StaticPermissionChecker, Translations,
    Translator,
};
use futures::FutureExt;
use tracing::{Instrument, Level, debug, span, trace, warn};

use super::cooldown::CooldownTracker;
use super::interaction_id::InteractionId;
use super::request::{ComponentRequest, ExecutionRequest};
use super::trigger::{
    ComponentInteraction, Invocation, ModalSubmit, Origin, StructuredCommand, TextMessage, Trigger,
};
use crate::command::{
    ArgKind, ArgValue, Arguments, CommandCatalog, CommandDefinition, ComponentKind, Guards,
    TriggerMode, nearest, split_command_line,
};
use crate::reporter::{ErrorReporter, ReportContext};

/// Fixed user-facing replies.
pub mod messages {
    use std::time::Duration;

    pub const PERMISSION_DENIED: &str = "You do not have permission to use this command.";
    pub const NSFW_CHANNEL: &str = "This command is nsfw and this channel is not nsfw.";
    pub const INVALID_USER: &str = "Invalid user.";
    pub const COMMAND_FAILED: &str = "An error occurred while running this command.";

    pub fn cooldown(remaining: Duration) -> String {
        format!(
            "Please wait {:.1}s before using this command again.",
            remaining.as_secs_f64()
        )
    }
}

/// Event published on the `framework` source for unbound modal submissions.
pub const MODAL_SUBMIT_EVENT: &str = "modalSubmit";

/// Why a trigger did not reach a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    BotAuthor,
    NoPrefix,
    UnknownCommand,
    ModeMismatch,
    DirectMessage,
    MissingPermission,
    NsfwChannel,
    Cooldown(Duration),
    /// The named user/member argument could not be resolved.
    InvalidUser(String),
    MissingBinding,
}

/// Terminal state of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command (or binding) ran and returned `Ok`.
    Dispatched { command: String },
    Rejected(RejectReason),
    /// A collaborator or the command failed; the failure has been reported.
    Failed,
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched { .. })
    }
}

/// Router settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Prefix used when a context record carries none.
    pub default_prefix: String,
    /// Largest edit distance accepted when correcting a command name.
    pub max_correction_distance: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_prefix: "z-".to_string(),
            max_correction_distance: 2,
        }
    }
}

/// Routes triggers into commands.
pub struct CommandRouter {
    catalog: Arc<CommandCatalog>,
    contexts: Arc<dyn ContextStore>,
    reporter: Arc<ErrorReporter>,
    permissions: Arc<dyn PermissionChecker>,
    members: Option<Arc<dyn MemberDirectory>>,
    translations: Arc<Translations>,
    events: Option<Arc<EventBus>>,
    cooldowns: CooldownTracker,
    config: RouterConfig,
}

impl CommandRouter {
    pub fn new(
        catalog: Arc<CommandCatalog>,
        contexts: Arc<dyn ContextStore>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            catalog,
            contexts,
            reporter,
            permissions: Arc::new(StaticPermissionChecker),
            members: None,
            translations: Arc::new(Translations::new()),
            events: None,
            cooldowns: CooldownTracker::new(),
            config: RouterConfig::default(),
        }
    }

    pub fn with_permissions(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = checker;
        self
    }

    pub fn with_members(mut self, directory: Arc<dyn MemberDirectory>) -> Self {
        self.members = Some(directory);
        self
    }

    pub fn with_translations(mut self, translations: Arc<Translations>) -> Self {
        self.translations = translations;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Routes one trigger to completion.
    pub async fn route(&self, trigger: Trigger) -> DispatchOutcome {
        let span = span!(
            Level::DEBUG,
            "route",
            user = %trigger.invocation().user.id,
            channel = %trigger.invocation().channel.id,
        );
        let outcome = async {
            match trigger {
                Trigger::Message(message) => self.route_text(message).await,
                Trigger::Command(command) => self.route_structured(command).await,
                Trigger::Component(interaction) => self.route_component(interaction).await,
            }
        }
        .instrument(span)
        .await;
        trace!(outcome = ?outcome, "Trigger routed");
        outcome
    }

    // ─── Resolution ──────────────────────────────────────────────────────────

    async fn route_text(&self, message: TextMessage) -> DispatchOutcome {
        let TextMessage {
            content,
            invocation,
        } = message;
        if invocation.user.bot {
            return DispatchOutcome::Rejected(RejectReason::BotAuthor);
        }

        let Some(context) = self.context(&invocation).await else {
            return DispatchOutcome::Failed;
        };
        let prefix = if context.prefix.is_empty() {
            self.config.default_prefix.as_str()
        } else {
            context.prefix.as_str()
        };
        let Some(body) = content.strip_prefix(prefix) else {
            return DispatchOutcome::Rejected(RejectReason::NoPrefix);
        };

        let mut tokens = split_command_line(body);
        if tokens.is_empty() {
            return DispatchOutcome::Rejected(RejectReason::UnknownCommand);
        }
        let name = tokens.remove(0).to_lowercase();
        let Some(top) = self.resolve_text_command(&name) else {
            debug!(command = %name, "Unknown command");
            return DispatchOutcome::Rejected(RejectReason::UnknownCommand);
        };

        let sub = tokens
            .first()
            .and_then(|token| self.catalog.get_sub(top.command_name(), token));
        let command = match sub {
            Some(sub) => {
                tokens.remove(0);
                sub
            }
            None => top,
        };

        self.execute(Origin::Text, command, tokens, HashMap::new(), context, invocation)
            .await
    }

    /// Name or alias, then the nearest name within the correction distance.
    fn resolve_text_command(&self, name: &str) -> Option<Arc<CommandDefinition>> {
        if let Some(command) = self.catalog.get(name) {
            return Some(command);
        }
        let names = self.catalog.names();
        let corrected = nearest(
            name,
            names.iter().map(String::as_str),
            self.config.max_correction_distance,
        )?;
        debug!(input = %name, corrected = %corrected, "Corrected command name");
        self.catalog.get(&corrected)
    }

    async fn route_structured(&self, command: StructuredCommand) -> DispatchOutcome {
        let StructuredCommand {
            name,
            subcommand,
            options,
            invocation,
        } = command;

        let Some(context) = self.context(&invocation).await else {
            return DispatchOutcome::Failed;
        };
        let resolved = match &subcommand {
            Some(sub) => self.catalog.get_sub(&name, sub),
            None => self.catalog.get(&name),
        };
        let Some(resolved) = resolved else {
            debug!(command = %name, subcommand = ?subcommand, "Unknown command");
            return DispatchOutcome::Rejected(RejectReason::UnknownCommand);
        };

        self.execute(Origin::Structured, resolved, Vec::new(), options, context, invocation)
            .await
    }

    async fn context(&self, invocation: &Invocation) -> Option<ContextRecord> {
        let id = invocation.context_id();
        match self.contexts.get_context(id).await {
            Ok(record) => Some(record),
            Err(err) => {
                self.reporter
                    .handle_error(&err, ReportContext::new(ErrorKind::Other).subject(id));
                None
            }
        }
    }

    // ─── Guards ──────────────────────────────────────────────────────────────

    async fn execute(
        &self,
        origin: Origin,
        command: Arc<CommandDefinition>,
        tokens: Vec<String>,
        options: HashMap<String, String>,
        context: ContextRecord,
        invocation: Invocation,
    ) -> DispatchOutcome {
        let key = command.key();
        let guards = *command.guard_set();

        if !command.trigger_mode().accepts(origin) {
            debug!(command = %key, origin = %origin, "Trigger mode does not accept origin");
            return DispatchOutcome::Rejected(RejectReason::ModeMismatch);
        }
        if invocation.channel.is_direct() && !guards.dm {
            debug!(command = %key, "Command not allowed in direct messages");
            return DispatchOutcome::Rejected(RejectReason::DirectMessage);
        }

        let privileged = self.is_privileged(&invocation).await;
        if (guards.admin_only || !guards.permissions.is_empty())
            && !self.permitted(&guards, &invocation, privileged).await
        {
            self.send(&invocation, Reply::text(messages::PERMISSION_DENIED)).await;
            return DispatchOutcome::Rejected(RejectReason::MissingPermission);
        }
        if guards.nsfw && !invocation.channel.nsfw && !privileged {
            self.send(&invocation, Reply::text(messages::NSFW_CHANNEL)).await;
            return DispatchOutcome::Rejected(RejectReason::NsfwChannel);
        }
        if let Err(remaining) = self.cooldowns.check(&invocation.user.id, &key) {
            return self.cooling_down(&invocation, remaining).await;
        }

        let args = match self
            .materialize(&command, origin, &tokens, &options, &invocation)
            .await
        {
            Ok(args) => args,
            Err(argument) => {
                self.send(&invocation, Reply::text(messages::INVALID_USER)).await;
                return DispatchOutcome::Rejected(RejectReason::InvalidUser(argument));
            }
        };
        if let Err(remaining) =
            self.cooldowns
                .mark(&invocation.user.id, &key, command.cooldown_period())
        {
            return self.cooling_down(&invocation, remaining).await;
        }

        let translator = Translator::new(
            Arc::clone(&self.translations),
            command.namespace(),
            context.language.clone(),
        );
        let Invocation {
            user,
            member,
            channel,
            guild,
            responder,
        } = invocation;
        let request = ExecutionRequest {
            origin,
            command: Arc::clone(&command),
            args,
            tokens,
            context,
            translator,
            user,
            member,
            channel,
            guild,
            responder,
        };

        self.dispatch(&command, request).await
    }

    async fn cooling_down(&self, invocation: &Invocation, remaining: Duration) -> DispatchOutcome {
        self.send(invocation, Reply::text(messages::cooldown(remaining))).await;
        DispatchOutcome::Rejected(RejectReason::Cooldown(remaining))
    }

    /// Guild owner, or holder of the administrator bit on the channel.
    async fn is_privileged(&self, invocation: &Invocation) -> bool {
        if invocation.is_guild_owner() {
            return true;
        }
        match &invocation.member {
            Some(member) => {
                self.permissions
                    .has_permission(member, &invocation.channel, Permissions::ADMINISTRATOR)
                    .await
            }
            None => false,
        }
    }

    async fn permitted(&self, guards: &Guards, invocation: &Invocation, privileged: bool) -> bool {
        if privileged {
            return true;
        }
        if guards.admin_only {
            return false;
        }
        let Some(member) = &invocation.member else {
            return false;
        };
        for bit in guards.permissions.iter() {
            if !self
                .permissions
                .has_permission(member, &invocation.channel, bit)
                .await
            {
                return false;
            }
        }
        true
    }

    // ─── Arguments ───────────────────────────────────────────────────────────

    /// Coerces raw input against the schema. `Err` names an unresolvable
    /// user argument.
    async fn materialize(
        &self,
        command: &CommandDefinition,
        origin: Origin,
        tokens: &[String],
        options: &HashMap<String, String>,
        invocation: &Invocation,
    ) -> Result<Arguments, String> {
        let mut args = Arguments::new();
        for (index, spec) in command.arg_specs().iter().enumerate() {
            let raw = match origin {
                Origin::Text => tokens.get(index),
                Origin::Structured => options.get(spec.name()),
            };
            let Some(raw) = raw else {
                continue;
            };
            let key = if spec.name().is_empty() {
                index.to_string()
            } else {
                spec.name().to_string()
            };

            let value = match spec.kind() {
                ArgKind::String => ArgValue::String(raw.clone()),
                ArgKind::User | ArgKind::Member => {
                    let id = strip_mention(raw, &["<@!", "<@"]);
                    let Some(member) = self.lookup_member(invocation, id).await else {
                        return Err(spec.name().to_string());
                    };
                    match (spec.kind(), member) {
                        (ArgKind::Member, Resolved::Member(member)) => ArgValue::Member(member),
                        (ArgKind::Member, Resolved::User(_)) => return Err(spec.name().to_string()),
                        (_, Resolved::Member(member)) => ArgValue::User(member.user),
                        (_, Resolved::User(user)) => ArgValue::User(user),
                    }
                }
                ArgKind::Channel => ArgValue::Channel(strip_mention(raw, &["<#"]).to_string()),
                ArgKind::Role => ArgValue::Role(strip_mention(raw, &["<@&"]).to_string()),
                ArgKind::Other(kind) => {
                    trace!(
                        argument = %spec.name(),
                        kind = %kind,
                        "Skipping argument with no coercion"
                    );
                    continue;
                }
            };
            args.insert(key, value);
        }
        Ok(args)
    }

    async fn lookup_member(&self, invocation: &Invocation, id: &str) -> Option<Resolved> {
        if let (Some(guild_id), Some(directory)) = (invocation.guild_id(), &self.members) {
            if let Some(member) = directory.member(guild_id, id).await {
                return Some(Resolved::Member(member));
            }
        }
        if invocation.user.id == id {
            return Some(match &invocation.member {
                Some(member) => Resolved::Member(member.clone()),
                None => Resolved::User(invocation.user.clone()),
            });
        }
        None
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    async fn dispatch(
        &self,
        command: &CommandDefinition,
        request: ExecutionRequest,
    ) -> DispatchOutcome {
        let key = command.key();
        let handler = Arc::clone(command.handler());
        let separated = command.trigger_mode() == TriggerMode::Separated;
        debug!(command = %key, origin = %request.origin, "Dispatching command");

        let result = AssertUnwindSafe(async {
            match (separated, request.origin) {
                (true, Origin::Text) => handler.execute_text(&request).await,
                (true, Origin::Structured) => handler.execute_structured(&request).await,
                (false, _) => handler.execute(&request).await,
            }
        })
        .catch_unwind()
        .await;

        match flatten_panic(result) {
            Ok(()) => DispatchOutcome::Dispatched { command: key },
            Err(err) => {
                self.reporter.report(&err, ReportContext::command_run(key));
                if let Err(e) = request.reply(Reply::ephemeral(messages::COMMAND_FAILED)).await {
                    warn!(error = %e, "Failed to deliver failure reply");
                }
                DispatchOutcome::Failed
            }
        }
    }

    async fn send(&self, invocation: &Invocation, reply: Reply) {
        if let Err(e) = invocation.responder.reply(reply).await {
            warn!(error = %e, user = %invocation.user.id, "Failed to deliver reply");
        }
    }

    // ─── Components ──────────────────────────────────────────────────────────

    async fn route_component(&self, interaction: ComponentInteraction) -> DispatchOutcome {
        let ComponentInteraction {
            kind,
            custom_id,
            values,
            fields,
            invocation,
        } = interaction;

        let Some(interaction_id) = InteractionId::parse(&custom_id) else {
            return DispatchOutcome::Rejected(RejectReason::UnknownCommand);
        };
        let Some(command) = self.catalog.get(&interaction_id.command) else {
            debug!(custom_id = %custom_id, "Component targets an unknown command");
            return DispatchOutcome::Rejected(RejectReason::UnknownCommand);
        };

        let Some(handler) = command.binds().get(kind).cloned() else {
            if kind == ComponentKind::Modal {
                return self
                    .publish_modal(&command, &interaction_id, custom_id, fields, &invocation)
                    .await;
            }
            debug!(command = %command.key(), kind = %kind, "Command has no binding for component");
            return DispatchOutcome::Rejected(RejectReason::MissingBinding);
        };

        let Some(context) = self.context(&invocation).await else {
            return DispatchOutcome::Failed;
        };
        let translator = Translator::new(
            Arc::clone(&self.translations),
            command.namespace(),
            context.language.clone(),
        );
        let request = ComponentRequest {
            kind,
            command: Arc::clone(&command),
            interaction_id,
            values,
            fields,
            context,
            translator,
            user: invocation.user,
            member: invocation.member,
            channel: invocation.channel,
            guild: invocation.guild,
            responder: invocation.responder,
        };

        let key = command.key();
        let result = AssertUnwindSafe(handler.handle(&request)).catch_unwind().await;
        match flatten_panic(result) {
            Ok(()) => DispatchOutcome::Dispatched { command: key },
            Err(err) => {
                self.reporter
                    .report(&err, ReportContext::command_run(format!("{key} ({kind})")));
                if let Err(e) = request.reply(Reply::ephemeral(messages::COMMAND_FAILED)).await {
                    warn!(error = %e, "Failed to deliver failure reply");
                }
                DispatchOutcome::Failed
            }
        }
    }

    async fn publish_modal(
        &self,
        command: &CommandDefinition,
        interaction_id: &InteractionId,
        custom_id: String,
        fields: HashMap<String, String>,
        invocation: &Invocation,
    ) -> DispatchOutcome {
        let Some(events) = self
            .events
            .as_ref()
            .filter(|events| events.has_source(FRAMEWORK_SOURCE))
        else {
            return DispatchOutcome::Rejected(RejectReason::MissingBinding);
        };

        let payload: EventPayload = Arc::new(ModalSubmit {
            command: command.key(),
            path: interaction_id.path(),
            custom_id,
            fields,
            user_id: invocation.user.id.clone(),
            channel_id: invocation.channel.id.clone(),
        });
        match events.emit(MODAL_SUBMIT_EVENT, FRAMEWORK_SOURCE, payload).await {
            Ok(listeners) => {
                debug!(command = %command.key(), listeners, "Published modal submission");
                DispatchOutcome::Dispatched {
                    command: command.key(),
                }
            }
            Err(err) => {
                self.reporter.handle_error(
                    &err,
                    ReportContext::new(ErrorKind::Other).subject(command.key()),
                );
                DispatchOutcome::Failed
            }
        }
    }
}

enum Resolved {
    User(cog_core::User),
    Member(cog_core::Member),
}

fn strip_mention<'a>(raw: &'a str, openers: &[&str]) -> &'a str {
    for opener in openers {
        if let Some(inner) = raw.strip_prefix(opener).and_then(|s| s.strip_suffix('>')) {
            return inner;
        }
    }
    raw
}

fn flatten_panic(
    result: Result<anyhow::Result<()>, Box<dyn std::any::Any + Send>>,
) -> anyhow::Result<()> {
    match result {
        Ok(inner) => inner,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow::anyhow!("command panicked: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ArgumentSpec, Command, ComponentHandler};
    use crate::reporter::MemorySink;
    use async_trait::async_trait;
    use cog_core::{
        Channel, Guild, ListenOptions, LocalEmitter, Member, MemoryContextStore,
        MemoryMemberDirectory, ReplyResult, Responder, StoreError, StoreResult, User, listener,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingResponder {
        replies: Mutex<Vec<Reply>>,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn reply(&self, reply: Reply) -> ReplyResult<()> {
            self.replies.lock().push(reply);
            Ok(())
        }
    }

    impl RecordingResponder {
        fn texts(&self) -> Vec<String> {
            self.replies.lock().iter().map(|r| r.content.clone()).collect()
        }
    }

    #[derive(Default)]
    struct Counting {
        runs: Arc<AtomicUsize>,
        last_args: Arc<Mutex<Option<Arguments>>>,
    }

    #[async_trait]
    impl Command for Counting {
        async fn execute(&self, request: &ExecutionRequest) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            *self.last_args.lock() = Some(request.args.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Command for Failing {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("database unreachable"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Command for Panicking {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            panic!("index out of bounds");
        }
    }

    #[derive(Default)]
    struct Split {
        text: AtomicUsize,
        structured: AtomicUsize,
    }

    #[async_trait]
    impl Command for Arc<Split> {
        async fn execute(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            anyhow::bail!("separated commands use the origin-specific entry points")
        }

        async fn execute_text(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            self.text.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute_structured(&self, _request: &ExecutionRequest) -> anyhow::Result<()> {
            self.structured.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Pressed(Arc<AtomicUsize>);

    #[async_trait]
    impl ComponentHandler for Pressed {
        async fn handle(&self, request: &ComponentRequest) -> anyhow::Result<()> {
            assert_eq!(request.interaction_id.params, vec!["7"]);
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ContextStore for BrokenStore {
        async fn get_context(&self, _id: &str) -> StoreResult<ContextRecord> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn put_context(&self, _record: ContextRecord) -> StoreResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        catalog: Arc<CommandCatalog>,
        contexts: Arc<MemoryContextStore>,
        reporter: Arc<ErrorReporter>,
        sink: Arc<MemorySink>,
        responder: Arc<RecordingResponder>,
    }

    impl Fixture {
        fn new() -> Self {
            let reporter = Arc::new(ErrorReporter::new());
            let sink = Arc::new(MemorySink::new());
            reporter.add_sink(sink.clone());
            Self {
                catalog: Arc::new(CommandCatalog::new()),
                contexts: Arc::new(MemoryContextStore::new("z-")),
                reporter,
                sink,
                responder: Arc::new(RecordingResponder::default()),
            }
        }

        fn router(&self) -> CommandRouter {
            CommandRouter::new(
                Arc::clone(&self.catalog),
                self.contexts.clone(),
                Arc::clone(&self.reporter),
            )
        }

        fn counting(&self, name: &str) -> Arc<AtomicUsize> {
            let command = Counting::default();
            let runs = Arc::clone(&command.runs);
            self.catalog.set(CommandDefinition::new(command).name(name));
            runs
        }

        fn guild_invocation(&self, user: &str) -> Invocation {
            Invocation::new(
                User::new(user, "someone"),
                Channel::guild("c1", "g1"),
                self.responder.clone(),
            )
            .member(Member::new(User::new(user, "someone"), "g1"))
            .guild(Guild::new("g1", "Guild", "owner"))
        }

        fn dm_invocation(&self) -> Invocation {
            Invocation::new(
                User::new("u1", "someone"),
                Channel::direct("d1"),
                self.responder.clone(),
            )
        }

        fn component(&self, kind: ComponentKind, custom_id: &str) -> Trigger {
            ComponentInteraction::new(kind, custom_id, self.guild_invocation("u1")).into()
        }
    }

    // ─── Text resolution ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_text_command_dispatch() {
        let fx = Fixture::new();
        let runs = fx.counting("ping");
        let router = fx.router();

        let outcome = router.route(Trigger::message("z-ping", fx.guild_invocation("u1"))).await;

        assert_eq!(outcome, DispatchOutcome::Dispatched { command: "ping".into() });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alias_and_case_insensitive_lookup() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(CommandDefinition::new(command).name("ping").alias("p"));
        let router = fx.router();

        let by_name = router
            .route(Trigger::message("z-PING", fx.guild_invocation("u1")))
            .await;
        let by_alias = router
            .route(Trigger::message("z-p", fx.guild_invocation("u1")))
            .await;
        assert!(by_name.is_dispatched());
        assert!(by_alias.is_dispatched());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_typo_correction() {
        let fx = Fixture::new();
        let runs = fx.counting("ping");
        let router = fx.router();

        let corrected = router.route(Trigger::message("z-pnig", fx.guild_invocation("u1"))).await;
        let unknown = router.route(Trigger::message("z-zzz", fx.guild_invocation("u1"))).await;

        assert!(corrected.is_dispatched());
        assert_eq!(unknown, DispatchOutcome::Rejected(RejectReason::UnknownCommand));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(fx.responder.texts().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_from_context_record() {
        let fx = Fixture::new();
        let runs = fx.counting("ping");
        let mut record = ContextRecord::new("g1", "z-");
        record.prefix = "!".into();
        fx.contexts.put_context(record).await.unwrap();
        let router = fx.router();

        let missing = router.route(Trigger::message("z-ping", fx.guild_invocation("u1"))).await;
        let custom = router.route(Trigger::message("!ping", fx.guild_invocation("u1"))).await;

        assert_eq!(missing, DispatchOutcome::Rejected(RejectReason::NoPrefix));
        assert!(custom.is_dispatched());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bot_authors_ignored() {
        let fx = Fixture::new();
        fx.counting("ping");
        let mut invocation = fx.guild_invocation("u1");
        invocation.user.bot = true;

        let outcome = fx.router().route(Trigger::message("z-ping", invocation)).await;
        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::BotAuthor));
    }

    #[tokio::test]
    async fn test_text_subcommand_and_tokens() {
        let fx = Fixture::new();
        let top = fx.counting("role");
        let sub = Counting::default();
        let sub_runs = Arc::clone(&sub.runs);
        let sub_args = Arc::clone(&sub.last_args);
        fx.catalog.set(
            CommandDefinition::new(sub)
                .name("add")
                .parent("role")
                .arg(ArgumentSpec::string("name")),
        );

        let outcome = fx
            .router()
            .route(Trigger::message(r#"z-role add "Night Owls""#, fx.guild_invocation("u1")))
            .await;

        assert_eq!(outcome, DispatchOutcome::Dispatched { command: "role add".into() });
        assert_eq!(top.load(Ordering::SeqCst), 0);
        assert_eq!(sub_runs.load(Ordering::SeqCst), 1);
        let args = sub_args.lock().clone().unwrap();
        assert_eq!(args.string("name"), Some("Night Owls"));
    }

    #[tokio::test]
    async fn test_quoted_subcommand_key_is_not_a_command_name() {
        let fx = Fixture::new();
        let top = fx.counting("role");
        let sub = Counting::default();
        let sub_runs = Arc::clone(&sub.runs);
        fx.catalog.set(CommandDefinition::new(sub).name("add").parent("role"));

        let outcome = fx
            .router()
            .route(Trigger::message(r#"z-"role add""#, fx.guild_invocation("u1")))
            .await;

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::UnknownCommand));
        assert_eq!(top.load(Ordering::SeqCst), 0);
        assert_eq!(sub_runs.load(Ordering::SeqCst), 0);
    }

    // ─── Structured resolution ───────────────────────────────────────────────

    #[tokio::test]
    async fn test_structured_subcommand_distinct_from_top_level() {
        let fx = Fixture::new();
        fx.counting("role");
        let top_add = fx.counting("add");
        let sub = Counting::default();
        let sub_runs = Arc::clone(&sub.runs);
        fx.catalog.set(CommandDefinition::new(sub).name("add").parent("role"));

        let trigger = StructuredCommand::new("role", fx.guild_invocation("u1")).subcommand("add");
        let outcome = fx.router().route(trigger.into()).await;

        assert_eq!(outcome, DispatchOutcome::Dispatched { command: "role add".into() });
        assert_eq!(sub_runs.load(Ordering::SeqCst), 1);
        assert_eq!(top_add.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_structured_name_cannot_address_subcommand_key() {
        let fx = Fixture::new();
        fx.counting("role");
        let sub = Counting::default();
        let sub_runs = Arc::clone(&sub.runs);
        fx.catalog.set(CommandDefinition::new(sub).name("add").parent("role"));

        let trigger = StructuredCommand::new("role add", fx.guild_invocation("u1"));
        let outcome = fx.router().route(trigger.into()).await;

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::UnknownCommand));
        assert_eq!(sub_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_structured_unknown_command() {
        let fx = Fixture::new();
        let trigger = StructuredCommand::new("nothing", fx.guild_invocation("u1"));
        let outcome = fx.router().route(trigger.into()).await;
        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::UnknownCommand));
    }

    #[tokio::test]
    async fn test_mode_mismatch_is_silent() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(CommandDefinition::new(command).name("legacy").mode(TriggerMode::Text));

        let trigger = StructuredCommand::new("legacy", fx.guild_invocation("u1"));
        let outcome = fx.router().route(trigger.into()).await;

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::ModeMismatch));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(fx.responder.texts().is_empty());
    }

    #[tokio::test]
    async fn test_separated_uses_origin_entry_points() {
        let fx = Fixture::new();
        let split = Arc::new(Split::default());
        fx.catalog.set(
            CommandDefinition::new(Arc::clone(&split))
                .name("stats")
                .mode(TriggerMode::Separated),
        );
        let router = fx.router();

        router.route(Trigger::message("z-stats", fx.guild_invocation("u1"))).await;
        router
            .route(StructuredCommand::new("stats", fx.guild_invocation("u1")).into())
            .await;

        assert_eq!(split.text.load(Ordering::SeqCst), 1);
        assert_eq!(split.structured.load(Ordering::SeqCst), 1);
    }

    // ─── Guards ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_dm_disallowed_command_never_dispatches() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        let args = Arc::clone(&command.last_args);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("ban")
                .arg(ArgumentSpec::user("target")),
        );

        let outcome = fx.router().route(Trigger::message("z-ban <@999>", fx.dm_invocation())).await;

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::DirectMessage));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(args.lock().is_none());
        assert!(fx.responder.texts().is_empty());
    }

    #[tokio::test]
    async fn test_dm_allowed_command() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(CommandDefinition::new(command).name("help").allow_dm());

        let outcome = fx.router().route(Trigger::message("z-help", fx.dm_invocation())).await;

        assert!(outcome.is_dispatched());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_permission_replies_and_rejects() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("purge")
                .permissions(Permissions::MANAGE_MESSAGES),
        );
        let router = fx.router();

        let denied = router.route(Trigger::message("z-purge", fx.guild_invocation("u1"))).await;
        let owner = router.route(Trigger::message("z-purge", fx.guild_invocation("owner"))).await;

        assert_eq!(denied, DispatchOutcome::Rejected(RejectReason::MissingPermission));
        assert!(owner.is_dispatched());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(fx.responder.texts(), vec![messages::PERMISSION_DENIED.to_string()]);
    }

    #[tokio::test]
    async fn test_permission_bits_and_admin_only() {
        let fx = Fixture::new();
        fx.catalog.set(
            CommandDefinition::new(Counting::default())
                .name("purge")
                .permissions(Permissions::MANAGE_MESSAGES),
        );
        fx.catalog.set(CommandDefinition::new(Counting::default()).name("shutdown").admin_only());
        let router = fx.router();

        let mut moderator = fx.guild_invocation("u1");
        moderator.member = moderator
            .member
            .map(|m| m.with_permissions(Permissions::MANAGE_MESSAGES));
        let mut admin = fx.guild_invocation("u2");
        admin.member = admin.member.map(|m| m.with_permissions(Permissions::ADMINISTRATOR));

        assert!(router.route(Trigger::message("z-purge", moderator.clone())).await.is_dispatched());
        assert_eq!(
            router.route(Trigger::message("z-shutdown", moderator)).await,
            DispatchOutcome::Rejected(RejectReason::MissingPermission)
        );
        assert!(router.route(Trigger::message("z-shutdown", admin)).await.is_dispatched());
    }

    #[tokio::test]
    async fn test_nsfw_guard() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(CommandDefinition::new(command).name("spicy").nsfw());
        let router = fx.router();

        let blocked = router.route(Trigger::message("z-spicy", fx.guild_invocation("u1"))).await;
        let mut nsfw = fx.guild_invocation("u1");
        nsfw.channel = nsfw.channel.nsfw(true);
        let allowed = router.route(Trigger::message("z-spicy", nsfw)).await;

        assert_eq!(blocked, DispatchOutcome::Rejected(RejectReason::NsfwChannel));
        assert!(allowed.is_dispatched());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(fx.responder.texts(), vec![messages::NSFW_CHANNEL.to_string()]);
    }

    #[tokio::test]
    async fn test_cooldown_rejects_second_use() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("daily")
                .cooldown(Duration::from_secs(60)),
        );
        let router = fx.router();

        let first = router.route(Trigger::message("z-daily", fx.guild_invocation("u1"))).await;
        let second = router.route(Trigger::message("z-daily", fx.guild_invocation("u1"))).await;
        let other_user = router.route(Trigger::message("z-daily", fx.guild_invocation("u2"))).await;

        assert!(first.is_dispatched());
        assert!(matches!(second, DispatchOutcome::Rejected(RejectReason::Cooldown(_))));
        assert!(other_user.is_dispatched());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(fx.responder.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_do_not_start_cooldown() {
        let fx = Fixture::new();
        let directory = Arc::new(MemoryMemberDirectory::new());
        directory.insert(Member::new(User::new("42", "target"), "g1"));
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("hug")
                .arg(ArgumentSpec::user("who"))
                .cooldown(Duration::from_secs(60)),
        );
        let router = fx.router().with_members(directory);

        let invalid = router
            .route(Trigger::message("z-hug <@404>", fx.guild_invocation("u1")))
            .await;
        let valid = router
            .route(Trigger::message("z-hug <@42>", fx.guild_invocation("u1")))
            .await;
        let again = router
            .route(Trigger::message("z-hug <@42>", fx.guild_invocation("u1")))
            .await;

        assert_eq!(invalid, DispatchOutcome::Rejected(RejectReason::InvalidUser("who".into())));
        assert!(valid.is_dispatched());
        assert!(matches!(again, DispatchOutcome::Rejected(RejectReason::Cooldown(_))));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    // ─── Arguments ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_user_argument_resolution() {
        let fx = Fixture::new();
        let directory = Arc::new(MemoryMemberDirectory::new());
        directory.insert(Member::new(User::new("42", "target"), "g1"));
        let command = Counting::default();
        let args = Arc::clone(&command.last_args);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("hug")
                .arg(ArgumentSpec::member("who"))
                .arg(ArgumentSpec::channel("where").optional()),
        );
        let router = fx.router().with_members(directory);

        let outcome = router
            .route(Trigger::message("z-hug <@!42> <#c9>", fx.guild_invocation("u1")))
            .await;

        assert!(outcome.is_dispatched());
        let args = args.lock().clone().unwrap();
        assert_eq!(args.member("who").map(|m| m.user.id.as_str()), Some("42"));
        assert_eq!(args.id("where"), Some("c9"));
    }

    #[tokio::test]
    async fn test_invalid_user_argument() {
        let fx = Fixture::new();
        let command = Counting::default();
        let runs = Arc::clone(&command.runs);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("hug")
                .arg(ArgumentSpec::user("who")),
        );
        let router = fx.router().with_members(Arc::new(MemoryMemberDirectory::new()));

        let outcome = router
            .route(Trigger::message("z-hug <@404>", fx.guild_invocation("u1")))
            .await;

        assert_eq!(outcome, DispatchOutcome::Rejected(RejectReason::InvalidUser("who".into())));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(fx.responder.texts(), vec![messages::INVALID_USER.to_string()]);
    }

    #[tokio::test]
    async fn test_structured_options_by_name() {
        let fx = Fixture::new();
        let command = Counting::default();
        let args = Arc::clone(&command.last_args);
        fx.catalog.set(
            CommandDefinition::new(command)
                .name("say")
                .arg(ArgumentSpec::string("text"))
                .arg(ArgumentSpec::role("role").optional()),
        );

        let trigger = StructuredCommand::new("say", fx.guild_invocation("u1"))
            .option("role", "r5")
            .option("text", "hello there");
        fx.router().route(trigger.into()).await;

        let args = args.lock().clone().unwrap();
        assert_eq!(args.string("text"), Some("hello there"));
        assert_eq!(args.id("role"), Some("r5"));
    }

    // ─── Failure isolation ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_failing_command_reported_once() {
        let fx = Fixture::new();
        fx.catalog.set(CommandDefinition::new(Failing).name("broken"));

        let outcome = fx
            .router()
            .route(Trigger::message("z-broken", fx.guild_invocation("u1")))
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(fx.sink.count(ErrorKind::CommandRun), 1);
        assert_eq!(fx.sink.reports()[0].subject.as_deref(), Some("broken"));
        let replies = fx.responder.replies.lock().clone();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].content, messages::COMMAND_FAILED);
        assert!(replies[0].ephemeral);
    }

    #[tokio::test]
    async fn test_panicking_command_is_contained() {
        let fx = Fixture::new();
        fx.catalog.set(CommandDefinition::new(Panicking).name("explode"));

        let outcome = fx
            .router()
            .route(Trigger::message("z-explode", fx.guild_invocation("u1")))
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(fx.sink.count(ErrorKind::CommandRun), 1);
        assert!(fx.sink.reports()[0].message.contains("index out of bounds"));
    }

    #[tokio::test]
    async fn test_context_store_failure() {
        let fx = Fixture::new();
        let runs = fx.counting("ping");
        let router = CommandRouter::new(
            Arc::clone(&fx.catalog),
            Arc::new(BrokenStore),
            Arc::clone(&fx.reporter),
        );

        let outcome = router.route(Trigger::message("z-ping", fx.guild_invocation("u1"))).await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(fx.sink.count(ErrorKind::Other), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    // ─── Components ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_button_binding_invoked() {
        let fx = Fixture::new();
        let pressed = Arc::new(AtomicUsize::new(0));
        fx.catalog.set(
            CommandDefinition::new(Counting::default())
                .name("poll")
                .bind(ComponentKind::Button, Pressed(Arc::clone(&pressed))),
        );
        let router = fx.router();

        let hit = router
            .route(fx.component(ComponentKind::Button, "poll.vote.7"))
            .await;
        let unbound = router
            .route(fx.component(ComponentKind::SelectMenu, "poll.pick"))
            .await;
        let unknown = router
            .route(fx.component(ComponentKind::Button, "ghost.x"))
            .await;

        assert!(hit.is_dispatched());
        assert_eq!(pressed.load(Ordering::SeqCst), 1);
        assert_eq!(unbound, DispatchOutcome::Rejected(RejectReason::MissingBinding));
        assert_eq!(unknown, DispatchOutcome::Rejected(RejectReason::UnknownCommand));
    }

    #[tokio::test]
    async fn test_unbound_modal_published_as_framework_event() {
        let fx = Fixture::new();
        fx.counting("feedback");
        let events = Arc::new(EventBus::new());
        events.add_source(FRAMEWORK_SOURCE, Arc::new(LocalEmitter::new()));
        let seen = Arc::new(Mutex::new(None::<String>));
        let seen_in = Arc::clone(&seen);
        events
            .add_listener(
                FRAMEWORK_SOURCE,
                MODAL_SUBMIT_EVENT,
                listener(move |payload: EventPayload| {
                    let seen = Arc::clone(&seen_in);
                    async move {
                        if let Some(submit) = payload.downcast_ref::<ModalSubmit>() {
                            *seen.lock() = submit.fields.get("text").cloned();
                        }
                        Ok(())
                    }
                }),
                ListenOptions::default(),
            )
            .unwrap();
        let router = fx.router().with_events(events);

        let interaction = ComponentInteraction::new(
            ComponentKind::Modal,
            "feedback.form",
            fx.guild_invocation("u1"),
        )
        .field("text", "great bot");
        let outcome = router.route(interaction.into()).await;

        assert!(outcome.is_dispatched());
        assert_eq!(seen.lock().as_deref(), Some("great bot"));
    }
}
