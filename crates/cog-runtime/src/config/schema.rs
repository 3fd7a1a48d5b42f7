//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CogConfig {
    /// Development mode: hot-reloads command folders and captures backtraces.
    #[serde(default)]
    pub debug: bool,

    /// Chat-platform credentials.
    #[serde(default)]
    pub bot: BotConfig,

    /// Document store connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat-platform credentials. Both fields are required at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub client_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URI. Required at startup.
    #[serde(default)]
    pub uri: String,
}

/// Command routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Prefix for contexts that have not chosen one.
    #[serde(default = "default_prefix")]
    pub default_prefix: String,

    /// Largest edit distance accepted when correcting a mistyped command.
    #[serde(default = "default_max_correction_distance")]
    pub max_correction_distance: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            default_prefix: default_prefix(),
            max_correction_distance: default_max_correction_distance(),
        }
    }
}

fn default_prefix() -> String {
    "z-".to_string()
}

fn default_max_correction_distance() -> usize {
    2
}

/// Module discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Folder scanned for module sub-folders. A missing folder is skipped.
    #[serde(default = "default_modules_dir")]
    pub dir: PathBuf,

    /// Extra module folders, activated before the scanned ones.
    #[serde(default)]
    pub bundles: Vec<BundleConfig>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            dir: default_modules_dir(),
            bundles: Vec::new(),
        }
    }
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

/// A module folder outside `modules.dir`, with activation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    pub path: PathBuf,

    /// Defaults to the folder name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "empty_object")]
    pub params: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-target levels, e.g. `cog_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// File rotation for `output = "file"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}
