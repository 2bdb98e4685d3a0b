//! Environment variable overrides.
//!
//! Unlike files, which are merged, an environment variable always wins over
//! whatever the files set for its field.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Prefix of every variable this crate reads.
pub const ENV_PREFIX: &str = "TETHER_";

/// Variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "TETHER_CONFIG";

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Bool,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static [&'static str],
    kind: Kind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "TETHER_LOG_LEVEL",
        field_path: &["logging", "level"],
        kind: Kind::String,
    },
    EnvMapping {
        var_name: "TETHER_QUERY_LOGGING",
        field_path: &["messenger", "logging", "enabled"],
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "TETHER_FULL_QUERY_LOGGING",
        field_path: &["messenger", "logging", "full"],
        kind: Kind::Bool,
    },
];

/// Collect all `TETHER_*` variables from the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply overrides from `env_vars` onto the merged TOML tree.
///
/// Returns the names of the variables that were applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a boolean variable holds something
/// other than `1`/`0`/`true`/`false`/`yes`/`no`/`on`/`off`.
pub fn apply_env_overrides(
    tree: &mut toml::Value,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Vec<String>> {
    let mut applied = Vec::new();
    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let value = match mapping.kind {
            Kind::String => toml::Value::String(raw.trim().to_owned()),
            Kind::Bool => toml::Value::Boolean(parse_bool(mapping.var_name, raw)?),
        };
        set_path(tree, mapping.field_path, value);
        debug!(var = mapping.var_name, field = %mapping.field_path.join("."), "applied env override");
        applied.push(mapping.var_name.to_owned());
    }
    Ok(applied)
}

/// Dotted config field a variable overrides, if it is a known override.
pub(crate) fn field_for(var_name: &str) -> Option<String> {
    ENV_MAPPINGS
        .iter()
        .find(|mapping| mapping.var_name == var_name)
        .map(|mapping| mapping.field_path.join("."))
}

fn parse_bool(var_name: &str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::EnvError {
            var_name: var_name.to_owned(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn set_path(tree: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = tree;
    for key in parents {
        if !node.is_table() {
            *node = toml::Value::Table(toml::map::Map::new());
        }
        let Some(table) = node.as_table_mut() else {
            return;
        };
        node = table
            .entry((*key).to_owned())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    if !node.is_table() {
        *node = toml::Value::Table(toml::map::Map::new());
    }
    if let Some(table) = node.as_table_mut() {
        table.insert((*last).to_owned(), value);
    }
}
