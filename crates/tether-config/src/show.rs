//! Display of the resolved configuration for `tether config`.
//!
//! Values set by an environment variable are annotated with the variable's
//! name in TOML output.

use std::fmt::Write as _;

use crate::env;
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// A resolved configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Config file paths that were loaded.
    pub loaded_files: Vec<String>,
    /// Environment variables that overrode a value.
    pub env_overrides: Vec<String>,
}

/// Output format for `tether config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with header and override comments.
    Toml,
    /// JSON (for programmatic consumption).
    Json,
}

impl ResolvedConfig {
    /// Render the resolved config, optionally limited to one top-level
    /// section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SerializeError`] if serialization fails or
    /// `section` does not name a section.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> ConfigResult<String> {
        let value = self.section_value(section)?;
        match format {
            ShowFormat::Toml => self.show_toml(&value, section),
            ShowFormat::Json => serde_json::to_string_pretty(&value)
                .map_err(|e| ConfigError::SerializeError(e.to_string())),
        }
    }

    fn section_value(&self, section: Option<&str>) -> ConfigResult<toml::Value> {
        let value = toml::Value::try_from(&self.config)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        let Some(name) = section else {
            return Ok(value);
        };
        value
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::SerializeError(format!("no config section '{name}'")))
    }

    fn show_toml(&self, value: &toml::Value, section: Option<&str>) -> ConfigResult<String> {
        let toml_str = toml::to_string_pretty(value)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        let mut output = String::new();
        output.push_str("# Resolved Tether configuration\n");
        if self.loaded_files.is_empty() {
            output.push_str("# No config file loaded; built-in defaults apply.\n");
        } else {
            output.push_str("#\n# Loaded files:\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                let _ = writeln!(output, "#   {}. {path}", i.saturating_add(1));
            }
        }
        output.push('\n');

        let overridden: Vec<(String, &str)> = self
            .env_overrides
            .iter()
            .filter_map(|var| env::field_for(var).map(|field| (field, var.as_str())))
            .collect();

        let mut table = section.unwrap_or_default().to_owned();
        for line in toml_str.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                table = match section {
                    Some(prefix) => format!("{prefix}.{header}"),
                    None => header.to_owned(),
                };
            } else if let Some((key, _)) = trimmed.split_once('=') {
                let key = key.trim();
                let field = if table.is_empty() {
                    key.to_owned()
                } else {
                    format!("{table}.{key}")
                };
                if let Some((_, var)) = overridden.iter().find(|(f, _)| *f == field) {
                    let _ = writeln!(output, "{line}  # [env: {var}]");
                    continue;
                }
            }
            output.push_str(line);
            output.push('\n');
        }

        Ok(output)
    }
}
