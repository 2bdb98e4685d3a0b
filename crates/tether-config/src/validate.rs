//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are usable
//! before any runtime type is built from them.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_messenger(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_messenger(config: &Config) -> ConfigResult<()> {
    let m = &config.messenger;

    for (field, entry_point) in [
        ("messenger.query_entry_point", &m.query_entry_point),
        ("messenger.response_entry_point", &m.response_entry_point),
    ] {
        if !is_script_identifier(entry_point) {
            return Err(ConfigError::ValidationError {
                field: field.to_owned(),
                message: format!(
                    "'{entry_point}' is not a script function name; expected letters, digits, '_', '$' or '.', not starting with a digit"
                ),
            });
        }
    }

    if m.query_entry_point == m.response_entry_point {
        return Err(ConfigError::ValidationError {
            field: "messenger.response_entry_point".to_owned(),
            message: "must differ from messenger.query_entry_point".to_owned(),
        });
    }

    if m.logging.unlogged_types.iter().any(String::is_empty) {
        return Err(ConfigError::ValidationError {
            field: "messenger.logging.unlogged_types".to_owned(),
            message: "query types must not be empty".to_owned(),
        });
    }

    Ok(())
}

/// Whether `name` can be spliced into `name('<base64>')` as a callee.
///
/// Dotted paths such as `bridge.receive` are allowed; each segment must be an
/// identifier.
#[must_use]
pub fn is_script_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    let valid_targets = ["stdout", "stderr", "file"];
    if !valid_targets.contains(&config.logging.target.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.target".to_owned(),
            message: format!(
                "unsupported log target '{}'; expected one of: {}",
                config.logging.target,
                valid_targets.join(", ")
            ),
        });
    }

    if config.logging.target == "file"
        && config
            .logging
            .directory
            .as_deref()
            .is_none_or(|dir| dir.trim().is_empty())
    {
        return Err(ConfigError::ValidationError {
            field: "logging.directory".to_owned(),
            message: "required when logging.target is 'file'".to_owned(),
        });
    }

    Ok(())
}
