//! CLI handlers for the `tether config` subcommand.

use std::path::Path;

use anyhow::Result;
use tether_config::env::CONFIG_PATH_VAR;
use tether_config::loader::user_config_path;
use tether_config::{Config, ShowFormat};

/// Show the resolved configuration.
pub(crate) fn show_config(path: Option<&Path>, format: &str, section: Option<&str>) -> Result<()> {
    let resolved = Config::load(path)?;

    let show_format = match format {
        "json" => ShowFormat::Json,
        _ => ShowFormat::Toml,
    };

    let output = resolved
        .show(show_format, section)
        .map_err(|e| anyhow::anyhow!("failed to format config: {e}"))?;

    println!("{output}");
    Ok(())
}

/// Validate the current configuration.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn validate_config(path: Option<&Path>) -> Result<()> {
    match Config::load(path) {
        Ok(resolved) => {
            println!("Configuration is valid.");
            if !resolved.loaded_files.is_empty() {
                println!("\nLoaded files:");
                for path in &resolved.loaded_files {
                    println!("  - {path}");
                }
            }
            Ok(())
        },
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        },
    }
}

/// Show which config file would be loaded.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn show_paths(path: Option<&Path>) -> Result<()> {
    println!("Configuration file candidates (first match wins):\n");

    let explicit = path.map(|p| p.display().to_string());
    let from_env = std::env::var(CONFIG_PATH_VAR).ok();
    let user = user_config_path().map(|p| p.display().to_string());

    let candidates = [
        ("--config", explicit),
        (CONFIG_PATH_VAR, from_env),
        ("user", user),
    ];
    for (i, (source, candidate)) in candidates.iter().enumerate() {
        let n = i.saturating_add(1);
        match candidate {
            Some(candidate) => {
                let status = if Path::new(candidate).exists() {
                    "found"
                } else {
                    "not found"
                };
                println!("  {n}. {source:<14} {candidate}  [{status}]");
            },
            None => println!("  {n}. {source:<14} (not set)"),
        }
    }

    println!("\nEnvironment overrides:");
    println!("  TETHER_LOG_LEVEL          -> logging.level");
    println!("  TETHER_QUERY_LOGGING      -> messenger.logging.enabled");
    println!("  TETHER_FULL_QUERY_LOGGING -> messenger.logging.full");

    Ok(())
}
