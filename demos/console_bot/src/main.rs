//! Console Bot Example
//!
//! Drives the Cog runtime from standard input: every line is routed as a chat
//! message from a single console user in a single guild.
//!
//! # Modules
//!
//! ```text
//! modules/
//! └── basics/              conventional folder module
//!     ├── commands/        ping.json, echo.json, help.json
//!     ├── translations/    en.json, es.json
//!     └── models/          Guild.json
//! ```
//!
//! The `stats` module is declared in code: it adds the `uptime` command,
//! listens for the runtime's `ready` event and serves `GET /stats`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot
//! > z-ping
//! > z-pnig          (corrected to ping)
//! > /api /stats
//! ```

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use cog::core::{ApiRequest, ApiResponse, FRAMEWORK_SOURCE, Method, ReplyResult, listener};
use cog::framework::{CommandCatalog, DispatchOutcome};
use cog::prelude::*;
use cog::runtime::StartupSummary;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const GUILD_ID: &str = "console-guild";
const CHANNEL_ID: &str = "console";

#[derive(Parser, Debug)]
#[command(about = "Talk to a Cog bot from the terminal")]
struct Args {
    /// Configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Modules folder.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/modules"))]
    modules: PathBuf,

    /// Name of the console user.
    #[arg(short, long, default_value = "console")]
    user: String,

    /// Enable debug mode (manifest hot reload).
    #[arg(long)]
    debug: bool,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Default)]
struct Ping;

#[async_trait]
impl Command for Ping {
    async fn execute(&self, request: &ExecutionRequest) -> Result<()> {
        let text = request.t("pong", &[("user", request.user.name.as_str())]);
        request.reply(text).await?;
        Ok(())
    }
}

#[derive(Default)]
struct Echo;

#[async_trait]
impl Command for Echo {
    async fn execute(&self, request: &ExecutionRequest) -> Result<()> {
        let text = if request.tokens.is_empty() {
            request.args.string("text").unwrap_or_default().to_string()
        } else {
            request.tokens.join(" ")
        };
        request.reply(text).await?;
        Ok(())
    }
}

struct Help {
    catalog: Arc<CommandCatalog>,
}

#[async_trait]
impl Command for Help {
    async fn execute(&self, request: &ExecutionRequest) -> Result<()> {
        let mut lines = vec![request.t("header", &[("prefix", request.context.prefix.as_str())])];
        let mut commands = self.catalog.get_all();
        commands.retain(|def| !def.is_hidden() && def.parent_name().is_none());
        commands.sort_by(|a, b| a.command_name().cmp(b.command_name()));

        for def in commands {
            let description = match def.description_override() {
                Some(text) => text.to_string(),
                None => request.t(&format!("$command.{}.description", def.command_name()), &[]),
            };
            lines.push(format!("  {}: {description}", def.command_name()));
        }
        request.reply(Reply::ephemeral(lines.join("\n"))).await?;
        Ok(())
    }
}

struct Uptime {
    started: Instant,
}

#[async_trait]
impl Command for Uptime {
    async fn execute(&self, request: &ExecutionRequest) -> Result<()> {
        let seconds = self.started.elapsed().as_secs().to_string();
        request.reply(request.t("running", &[("seconds", seconds.as_str())])).await?;
        Ok(())
    }
}

// ============================================================================
// Stats module
// ============================================================================

struct Stats {
    started: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

#[async_trait]
impl Module for Stats {
    async fn register_commands(&self, scope: &mut ModuleScope) -> Result<()> {
        let uptime = Uptime {
            started: self.started,
        };
        scope.add_command(CommandDefinition::new(uptime).name("uptime").alias("up"));
        Ok(())
    }

    async fn register_events(&self, scope: &mut ModuleScope) -> Result<()> {
        scope.listen(
            FRAMEWORK_SOURCE,
            "ready",
            listener(|payload| async move {
                if let Some(summary) = payload.downcast_ref::<StartupSummary>() {
                    info!(
                        modules = summary.modules,
                        commands = summary.commands,
                        models = ?summary.models,
                        "Console bot ready"
                    );
                }
                Ok(())
            }),
        );
        Ok(())
    }

    async fn register_routes(&self, scope: &mut ModuleScope) -> Result<()> {
        let started = self.started;
        scope.route(Method::Get, "/stats", move |_request: ApiRequest| async move {
            Ok(ApiResponse::ok(json!({
                "uptime_secs": started.elapsed().as_secs(),
            })))
        });
        Ok(())
    }
}

// ============================================================================
// Console I/O
// ============================================================================

struct ConsoleResponder;

#[async_trait]
impl Responder for ConsoleResponder {
    async fn reply(&self, reply: Reply) -> ReplyResult<()> {
        let marker = if reply.ephemeral { "(only you) " } else { "" };
        println!("< {marker}{}", reply.content);
        Ok(())
    }
}

fn invocation(user: &User) -> Invocation {
    Invocation::new(
        user.clone(),
        Channel::guild(CHANNEL_ID, GUILD_ID),
        Arc::new(ConsoleResponder),
    )
    .guild(Guild::new(GUILD_ID, "Console", user.id.clone()))
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Routes stdin lines until EOF or `quit`.
async fn console_loop(runtime: &CogRuntime, user: User) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        };
        let line = line.trim();

        if line == "quit" {
            break;
        }
        if let Some(path) = line.strip_prefix("/api ") {
            let response = runtime.invoke(ApiRequest::new(Method::Get, path.trim())).await;
            println!("< {} {}", response.status, response.body);
        } else if !line.is_empty() {
            let outcome = runtime
                .route(Trigger::message(line, invocation(&user)))
                .await;
            if let DispatchOutcome::Rejected(reason) = outcome {
                println!("< ({reason:?})");
            }
        }
        prompt();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = CogRuntime::builder()
        .set("bot.token", "console")
        .set("bot.client_id", "console")
        .set("database.uri", "memory://")
        .set("modules.dir", &args.modules)
        .set("debug", args.debug)
        .module(ModuleDescriptor::of::<Stats>(args.modules.join("stats")).name("stats"));
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;

    runtime.handlers().register_default::<Ping>("ping");
    runtime.handlers().register_default::<Echo>("echo");
    let catalog = Arc::clone(runtime.catalog());
    runtime.handlers().register("help", move || {
        let help = Help {
            catalog: Arc::clone(&catalog),
        };
        Ok(CommandDefinition::new(help).name("help"))
    });

    let user = User::new("console-user", args.user);
    runtime.run_until(console_loop(&runtime, user)).await?;
    Ok(())
}
