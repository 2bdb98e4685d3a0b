//! Query and response tracing.
//!
//! Every query and response crossing the bridge can be traced on the
//! `tether::query` target. Two independent flags gate the output: `enabled`
//! turns tracing on, `full` adds the payload. Both can be flipped at runtime.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tether_core::json_text::pretty;
use tether_core::{Outcome, Query, QueryId};
use tracing::info;

use crate::config::QueryLogConfig;

/// Tracing target for query logs.
pub const QUERY_LOG_TARGET: &str = "tether::query";

/// Which way a message is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to script surface.
    HostToScript,
    /// Script surface to host.
    ScriptToHost,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostToScript => f.write_str("host -> script"),
            Self::ScriptToHost => f.write_str("script -> host"),
        }
    }
}

/// Runtime-toggleable query logger.
#[derive(Debug, Default)]
pub struct QueryLog {
    enabled: AtomicBool,
    full: AtomicBool,
    unlogged_types: RwLock<HashSet<String>>,
}

impl QueryLog {
    /// Create a logger from config.
    #[must_use]
    pub fn new(config: &QueryLogConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            full: AtomicBool::new(config.full),
            unlogged_types: RwLock::new(config.unlogged_types.clone()),
        }
    }

    /// Whether query logging is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn query logging on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether payloads are included.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.full.load(Ordering::Relaxed)
    }

    /// Include or omit payloads.
    pub fn set_full(&self, full: bool) {
        self.full.store(full, Ordering::Relaxed);
    }

    /// Stop tracing queries of `query_type`.
    pub fn suppress_type(&self, query_type: impl Into<String>) {
        self.unlogged_types
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(query_type.into());
    }

    /// Resume tracing queries of `query_type`.
    pub fn unsuppress_type(&self, query_type: &str) {
        self.unlogged_types
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(query_type);
    }

    /// Whether a query of this type would be traced.
    #[must_use]
    pub fn should_log(&self, query_type: &str) -> bool {
        self.is_enabled()
            && !self
                .unlogged_types
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .contains(query_type)
    }

    /// Trace a query.
    pub fn log_query(&self, direction: Direction, query: &Query) {
        if !self.should_log(&query.query_type) {
            return;
        }
        if self.is_full() {
            info!(
                target: QUERY_LOG_TARGET,
                direction = %direction,
                query_id = %query.id,
                query_type = %query.query_type,
                payload = %pretty(&query.payload),
                "Query"
            );
        } else {
            info!(
                target: QUERY_LOG_TARGET,
                direction = %direction,
                query_id = %query.id,
                query_type = %query.query_type,
                "Query"
            );
        }
    }

    /// Trace a response.
    pub fn log_response(
        &self,
        direction: Direction,
        id: QueryId,
        query_type: &str,
        outcome: &Outcome,
    ) {
        if !self.should_log(query_type) {
            return;
        }
        let status = if outcome.is_success() { "success" } else { "failure" };
        if self.is_full() {
            let detail = match outcome {
                Outcome::Success(payload) => pretty(payload),
                Outcome::Failure(error) => pretty(&Some(error.clone())),
            };
            info!(
                target: QUERY_LOG_TARGET,
                direction = %direction,
                query_id = %id,
                query_type,
                status,
                payload = %detail,
                "Response"
            );
        } else {
            info!(
                target: QUERY_LOG_TARGET,
                direction = %direction,
                query_id = %id,
                query_type,
                status,
                "Response"
            );
        }
    }
}
