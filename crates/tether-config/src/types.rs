//! Configuration types for the Tether query bridge.
//!
//! All types in this module are self-contained with no dependencies on other
//! internal tether crates. Conversion into runtime types happens at the
//! boundary (`MessengerConfig::from`, `LogConfig::from_section`). Every
//! struct implements [`Default`] matching `defaults.toml`, so a bare
//! `[section]` header produces a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Messenger entry points and query logging.
    pub messenger: MessengerSection,
    /// Process-wide tracing output.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// MessengerSection
// ---------------------------------------------------------------------------

/// Messenger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerSection {
    /// Script function receiving host queries.
    pub query_entry_point: String,
    /// Script function receiving responses to script queries.
    pub response_entry_point: String,
    /// Assert when a response does not decode into the caller's type.
    /// Unset means "only in debug builds".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assert_on_type_mismatch: Option<bool>,
    /// Query tracing.
    pub logging: QueryLoggingSection,
}

impl Default for MessengerSection {
    fn default() -> Self {
        Self {
            query_entry_point: "tetherQuery".to_owned(),
            response_entry_point: "tetherQueryResponse".to_owned(),
            assert_on_type_mismatch: None,
            logging: QueryLoggingSection::default(),
        }
    }
}

/// Query tracing flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLoggingSection {
    /// Trace every query and response.
    pub enabled: bool,
    /// Include payloads in traces.
    pub full: bool,
    /// Query types that are never traced.
    pub unlogged_types: Vec<String>,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"` (human-friendly), `"compact"` (one-line),
    /// `"json"` (structured), or `"full"` (verbose).
    pub format: String,
    /// Output target: `"stdout"`, `"stderr"` or `"file"`.
    pub target: String,
    /// Directory for daily-rotated log files when `target = "file"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Per-module tracing directives (e.g. `["tether::query=info"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directory: None,
            directives: Vec::new(),
        }
    }
}
