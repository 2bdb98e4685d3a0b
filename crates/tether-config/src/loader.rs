//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge one config file: the explicit path, else `$TETHER_CONFIG`, else
//!    `<config dir>/tether/config.toml` if it exists
//! 3. Apply `TETHER_*` environment overrides
//! 4. Deserialize merged tree → `Config`
//! 5. Validate
//! 6. Return `ResolvedConfig`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{CONFIG_PATH_VAR, apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered precedence, reading the process
/// environment.
///
/// An explicit `path` must exist. `$TETHER_CONFIG` must exist when set. The
/// user config file is optional.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file is missing, malformed or
/// too large, an environment override is invalid, or the final
/// configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_with_env(path, &collect_env_vars(), user_config_path())
}

/// [`load`] with an explicit environment and user config location.
///
/// # Errors
///
/// As [`load`].
pub fn load_with_env(
    path: Option<&Path>,
    env_vars: &HashMap<String, String>,
    user_config: Option<PathBuf>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut loaded_files = Vec::new();

    // 2. One config file.
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| env_vars.get(CONFIG_PATH_VAR).map(PathBuf::from));
    let overlay = match (explicit, user_config) {
        (Some(path), _) => Some((read_file(&path)?, path)),
        (None, Some(path)) => try_load_file(&path)?.map(|overlay| (overlay, path)),
        (None, None) => None,
    };
    if let Some((overlay, path)) = overlay {
        deep_merge(&mut merged, overlay);
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.display().to_string());
    }

    // 3. Environment overrides.
    let env_overrides = apply_env_overrides(&mut merged, env_vars)?;
    if !env_overrides.is_empty() {
        debug!(count = env_overrides.len(), "applied environment overrides");
    }

    // 4. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 5. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
        env_overrides,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    deep_merge(&mut merged, read_file(path)?);

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: path.display().to_string(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Location of the per-user config file, if a config directory exists.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("tether").join("config.toml"))
}

/// Read and parse a file that must exist.
fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_checked(path, &content)
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Uses a single read operation to avoid TOCTOU races (no separate
/// exists/metadata checks before reading).
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    parse_checked(path, &content).map(Some)
}

fn parse_checked(path: &Path, content: &str) -> ConfigResult<toml::Value> {
    // Check size after reading to avoid TOCTOU between stat and read.
    let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {size} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}

/// Merge `overlay` into `base`. Tables merge key by key; any other value in
/// the overlay replaces the base value.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    },
                }
            }
        },
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_parse() {
        let val: toml::Value = toml::from_str(DEFAULTS_TOML).unwrap();
        assert!(val.as_table().unwrap().contains_key("messenger"));
        assert!(val.as_table().unwrap().contains_key("logging"));
    }

    #[test]
    fn test_defaults_match_default_impl() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_without_files() {
        let resolved = load_with_env(None, &no_env(), None).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_explicit_file_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tether.toml",
            "[messenger]\nquery_entry_point = \"bridge.query\"\n\n[messenger.logging]\nenabled = true\nunlogged_types = [\"tick\"]\n",
        );

        let resolved = load_with_env(Some(&path), &no_env(), None).unwrap();
        let m = &resolved.config.messenger;
        assert_eq!(m.query_entry_point, "bridge.query");
        assert_eq!(m.response_entry_point, "tetherQueryResponse");
        assert!(m.logging.enabled);
        assert_eq!(m.logging.unlogged_types, vec!["tick"]);
        assert_eq!(resolved.loaded_files, vec![path.display().to_string()]);
    }

    #[test]
    fn test_env_path_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "env.toml", "[logging]\nlevel = \"warn\"\n");
        let env: HashMap<String, String> = [
            ("TETHER_CONFIG".to_owned(), path.display().to_string()),
            ("TETHER_LOG_LEVEL".to_owned(), "trace".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_with_env(None, &env, None).unwrap();
        assert_eq!(resolved.config.logging.level, "trace");
        assert_eq!(resolved.loaded_files.len(), 1);
        assert_eq!(resolved.env_overrides, vec!["TETHER_LOG_LEVEL"]);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load_with_env(Some(&missing), &no_env(), None).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_user_file_is_optional() {
        let dir = TempDir::new().unwrap();
        let resolved =
            load_with_env(None, &no_env(), Some(dir.path().join("config.toml"))).unwrap();
        assert!(resolved.loaded_files.is_empty());

        let user = write(&dir, "config.toml", "[logging]\nformat = \"json\"\n");
        let resolved = load_with_env(None, &no_env(), Some(user)).unwrap();
        assert_eq!(resolved.config.logging.format, "json");
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = TempDir::new().unwrap();
        let padding = "#".repeat(1_048_577);
        let path = write(&dir, "big.toml", &padding);
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "[messenger\n");
        assert!(matches!(
            load_file(&path).unwrap_err(),
            ConfigError::ParseError { .. }
        ));

        let path = write(&dir, "invalid.toml", "[logging]\nlevel = \"loud\"\n");
        assert!(matches!(
            load_file(&path).unwrap_err(),
            ConfigError::ValidationError { .. }
        ));
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut base: toml::Value = toml::from_str("a = [1, 2]\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = [3]\n[t]\ny = 5\n").unwrap();
        deep_merge(&mut base, overlay);
        assert_eq!(base["a"].as_array().unwrap().len(), 1);
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(5));
    }
}
