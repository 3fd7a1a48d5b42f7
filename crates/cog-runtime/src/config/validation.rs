//! Configuration validation.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BundleConfig, CogConfig, LogOutput};

/// Validates the entire configuration.
pub fn validate_config(config: &CogConfig) -> ConfigResult<()> {
    validate_credentials(config)?;
    validate_commands(config)?;
    validate_bundles(&config.modules.bundles)?;
    validate_logging(config)?;
    Ok(())
}

/// Credentials have no usable default.
fn validate_credentials(config: &CogConfig) -> ConfigResult<()> {
    let required = [
        ("bot.token", "BOT_TOKEN", &config.bot.token),
        ("bot.client_id", "BOT_CLIENT_ID", &config.bot.client_id),
        ("database.uri", "DATABASE_URI", &config.database.uri),
    ];
    for (field, env, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::missing_field(field, env));
        }
    }
    Ok(())
}

fn validate_commands(config: &CogConfig) -> ConfigResult<()> {
    let prefix = &config.commands.default_prefix;
    if prefix.is_empty() {
        return Err(ConfigError::validation("Default prefix cannot be empty"));
    }
    if prefix.contains(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "Default prefix cannot contain whitespace: {prefix:?}"
        )));
    }
    Ok(())
}

fn validate_bundles(bundles: &[BundleConfig]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for bundle in bundles {
        if bundle.path.as_os_str().is_empty() {
            return Err(ConfigError::missing_field("modules.bundles[].path", "cog.toml"));
        }
        if !bundle.params.is_object() {
            return Err(ConfigError::validation(format!(
                "Bundle {} params must be a table",
                bundle.path.display()
            )));
        }
        let name = bundle.name.clone().unwrap_or_else(|| {
            bundle
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateBundle(name));
        }
    }
    Ok(())
}

fn validate_logging(config: &CogConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path", "COG_LOGGING__FILE_PATH"));
    }
    Ok(())
}
