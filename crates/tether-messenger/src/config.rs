//! Messenger configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
pub use tether_core::wire::{DEFAULT_QUERY_ENTRY_POINT, DEFAULT_RESPONSE_ENTRY_POINT};

/// Query logging flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLogConfig {
    /// Trace every query and response.
    pub enabled: bool,
    /// Include payloads in the trace.
    pub full: bool,
    /// Query types that are never traced.
    pub unlogged_types: HashSet<String>,
}

impl QueryLogConfig {
    /// Enable query logging.
    #[must_use]
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Enable payload logging.
    #[must_use]
    pub fn full(mut self) -> Self {
        self.full = true;
        self
    }

    /// Never trace queries of this type.
    #[must_use]
    pub fn without_type(mut self, query_type: impl Into<String>) -> Self {
        self.unlogged_types.insert(query_type.into());
        self
    }
}

/// Messenger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Script function that receives host queries.
    pub query_entry_point: String,
    /// Script function that receives responses to script queries.
    pub response_entry_point: String,
    /// Panic in debug builds when a response does not decode into the
    /// caller's expected type.
    pub assert_on_type_mismatch: bool,
    /// Query logging flags.
    pub logging: QueryLogConfig,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            query_entry_point: DEFAULT_QUERY_ENTRY_POINT.to_string(),
            response_entry_point: DEFAULT_RESPONSE_ENTRY_POINT.to_string(),
            assert_on_type_mismatch: cfg!(debug_assertions),
            logging: QueryLogConfig::default(),
        }
    }
}

impl MessengerConfig {
    /// Set the script entry points.
    #[must_use]
    pub fn with_entry_points(
        mut self,
        query_entry_point: impl Into<String>,
        response_entry_point: impl Into<String>,
    ) -> Self {
        self.query_entry_point = query_entry_point.into();
        self.response_entry_point = response_entry_point.into();
        self
    }

    /// Set query logging flags.
    #[must_use]
    pub fn with_logging(mut self, logging: QueryLogConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Report type mismatches as errors only, never as debug assertions.
    #[must_use]
    pub fn without_mismatch_assertions(mut self) -> Self {
        self.assert_on_type_mismatch = false;
        self
    }
}

#[cfg(feature = "config")]
impl From<&tether_config::MessengerSection> for MessengerConfig {
    fn from(section: &tether_config::MessengerSection) -> Self {
        Self {
            query_entry_point: section.query_entry_point.clone(),
            response_entry_point: section.response_entry_point.clone(),
            assert_on_type_mismatch: section
                .assert_on_type_mismatch
                .unwrap_or(cfg!(debug_assertions)),
            logging: QueryLogConfig {
                enabled: section.logging.enabled,
                full: section.logging.full,
                unlogged_types: section.logging.unlogged_types.iter().cloned().collect(),
            },
        }
    }
}
