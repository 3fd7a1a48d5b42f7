//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults (and [`ConfigLoader::merge`] bases)
//! 2. Profile-specific config file (`cog.{profile}.toml`)
//! 3. Main config file (`cog.toml`)
//! 4. Environment variables (`COG_*`, `__` separates nesting levels)
//! 5. Bootstrap variables (`BOT_TOKEN`, `BOT_CLIENT_ID`, `DATABASE_URI`, `BOT_PREFIX`)
//! 6. Programmatic overrides ([`ConfigLoader::set`])
//!
//! - `COG_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `COG_COMMANDS__DEFAULT_PREFIX=!` → `commands.default_prefix = "!"`
//! - `BOT_TOKEN=xxx` → `bot.token = "xxx"`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .set("debug", false)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::value::{Uncased, UncasedStr};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CogConfig;
use super::validation::validate_config;

/// Variables accepted without the `COG_` prefix, and the keys they set.
pub const BOOTSTRAP_VARS: [(&str, &str); 4] = [
    ("BOT_TOKEN", "bot.token"),
    ("BOT_CLIENT_ID", "bot.client_id"),
    ("DATABASE_URI", "database.uri"),
    ("BOT_PREFIX", "commands.default_prefix"),
];

const CONFIG_STEM: &str = "cog";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `COG_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("COG_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    base: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
    overrides: Vec<(String, serde_json::Value)>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            base: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
            overrides: Vec::new(),
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a folder searched for `cog.toml`. Without any, the current
    /// directory and the user config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores `COG_*` and bootstrap variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration just above the built-in defaults.
    pub fn merge(mut self, config: CogConfig) -> Self {
        self.base = self.base.merge(Serialized::defaults(config));
        self
    }

    /// Overrides one dotted key above every other source.
    ///
    /// Values that cannot be serialized are ignored with a warning.
    pub fn set(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => self.overrides.push((key, value)),
            Err(e) => warn!(key = %key, error = %e, "Ignoring unserializable override"),
        }
        self
    }

    /// Loads the merged configuration without validating it.
    pub fn extract(self) -> ConfigResult<CogConfig> {
        let profile = self.profile.clone();
        let config: CogConfig = self.build_figment()?.extract()?;
        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            debug = config.debug,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads and validates the configuration.
    pub fn load(self) -> ConfigResult<CogConfig> {
        let config = self.extract()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CogConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.base));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            if path.extension().is_none_or(|ext| ext != "toml") {
                return Err(ConfigError::UnsupportedFormat(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with COG_ prefix");
            figment = figment
                .merge(Env::prefixed("COG_").ignore(&["PROFILE"]).split("__"))
                .merge(
                    Env::raw()
                        .only(&BOOTSTRAP_VARS.map(|(var, _)| var))
                        .map(bootstrap_key),
                );
        }

        for (key, value) in self.overrides {
            figment = figment.merge(Serialized::default(&key, value));
        }
        Ok(figment)
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_STEM));
        }
        paths
    }

    /// Merges the profile file, then the main file, from the first search
    /// path that has a main file.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            let profile_path =
                search_path.join(format!("{CONFIG_STEM}.{}.toml", self.profile.as_str()));
            let base_path = search_path.join(format!("{CONFIG_STEM}.toml"));
            if !base_path.exists() {
                continue;
            }
            if profile_path.exists() {
                debug!(path = %profile_path.display(), "Loading profile-specific config");
                figment = figment.merge(Toml::file(&profile_path));
            }
            info!(path = %base_path.display(), "Loading configuration file");
            return figment.merge(Toml::file(&base_path));
        }
        warn!("No configuration file found, using defaults");
        figment
    }
}

fn bootstrap_key(key: &UncasedStr) -> Uncased<'_> {
    let path = BOOTSTRAP_VARS
        .iter()
        .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
        .map_or(key.as_str(), |(_, path)| *path);
    Uncased::from_borrowed(path)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn credentials(jail: &mut Jail) {
        jail.set_env("BOT_TOKEN", "token");
        jail.set_env("BOT_CLIENT_ID", "client");
        jail.set_env("DATABASE_URI", "memory://");
    }

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .extract()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.commands.default_prefix, "z-");
            assert_eq!(config.commands.max_correction_distance, 2);
            assert_eq!(config.logging.level.as_str(), "info");
            assert!(!config.debug);
            Ok(())
        });
    }

    #[test]
    fn test_layers_override_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cog.toml",
                r#"
                debug = true

                [commands]
                default_prefix = "!"
                max_correction_distance = 1
                "#,
            )?;
            jail.create_file("cog.development.toml", "[logging]\nlevel = \"debug\"\n")?;
            jail.set_env("COG_COMMANDS__MAX_CORRECTION_DISTANCE", "3");
            jail.set_env("BOT_PREFIX", "?");
            credentials(jail);

            let config = ConfigLoader::new()
                .profile("dev")
                .search_path(jail.directory())
                .set("debug", false)
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level.as_str(), "debug");
            assert_eq!(config.commands.max_correction_distance, 3);
            assert_eq!(config.commands.default_prefix, "?");
            assert_eq!(config.bot.token, "token");
            assert_eq!(config.database.uri, "memory://");
            assert!(!config.debug);
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_credentials() {
        Jail::expect_with(|jail| {
            jail.set_env("COG_BOT__TOKEN", "prefixed");
            jail.set_env("COG_BOT__CLIENT_ID", "client");
            jail.set_env("COG_DATABASE__URI", "memory://");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.bot.token, "prefixed");
            Ok(())
        });
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        Jail::expect_with(|jail| {
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap_err();

            assert!(matches!(
                err,
                ConfigError::MissingField { ref field, .. } if field == "bot.token"
            ));
            assert!(err.to_string().contains("BOT_TOKEN"));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = ConfigLoader::new()
            .file("does/not/exist.toml")
            .without_env()
            .extract()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }
}
