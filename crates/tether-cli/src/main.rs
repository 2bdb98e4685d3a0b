//! Tether CLI - inspect configuration and exercise the query bridge.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tether_telemetry::{LogConfig, LogFormat, setup_logging};

mod commands;

use commands::{config, echo};

/// Tether - bidirectional query bridge between a host and a script surface
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// View and validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Send a query across an in-process loopback bridge and print the reply
    Echo {
        /// JSON payload; omit for void
        #[arg(default_value = "")]
        payload: String,

        /// Query type to send (only `echo` has a handler)
        #[arg(short, long, default_value = echo::ECHO)]
        query_type: String,

        /// Trace queries and responses with their payloads
        #[arg(long)]
        trace_queries: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,

        /// Only show one section (e.g. "messenger")
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Validate the configuration
    Validate,
    /// Show which config file is used
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load unified config for logging setup.
    let unified_cfg = tether_config::Config::load(cli.config.as_deref())
        .ok()
        .map(|r| r.config);

    // Set up logging from config, with --verbose override.
    let mut log_config = unified_cfg
        .as_ref()
        .and_then(|cfg| LogConfig::from_section(&cfg.logging).ok())
        .unwrap_or_else(|| LogConfig::new("info").with_format(LogFormat::Compact));
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Config { command } => handle_config(command, cli.config.as_deref()),
        Commands::Echo {
            payload,
            query_type,
            trace_queries,
        } => {
            let mut cfg = match unified_cfg {
                Some(cfg) => cfg,
                // Surface the load error rather than silently using defaults.
                None => tether_config::Config::load(cli.config.as_deref())?.config,
            };
            if trace_queries {
                cfg.messenger.logging.enabled = true;
                cfg.messenger.logging.full = true;
            }
            echo::run_echo(&cfg, &query_type, &payload).await
        },
    }
}

fn handle_config(command: ConfigCommands, path: Option<&std::path::Path>) -> Result<()> {
    match command {
        ConfigCommands::Show { format, section } => {
            config::show_config(path, &format, section.as_deref())
        },
        ConfigCommands::Validate => config::validate_config(path),
        ConfigCommands::Paths => config::show_paths(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_echo() {
        let cli = Cli::try_parse_from(["tether", "echo", r#"{"a":1}"#, "--trace-queries"]).unwrap();
        match cli.command {
            Commands::Echo {
                payload,
                query_type,
                trace_queries,
            } => {
                assert_eq!(payload, r#"{"a":1}"#);
                assert_eq!(query_type, "echo");
                assert!(trace_queries);
            },
            Commands::Config { .. } => panic!("expected echo"),
        }
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from([
            "tether", "--config", "/tmp/t.toml", "config", "show", "-f", "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show { ref format, section: None }
            } if format == "json"
        ));
    }
}
