//! Error types for queries, handlers and script surfaces.

use std::fmt;

use serde_json::{Value, json};
use thiserror::Error;

use crate::json_text::JsonTextError;

/// Key of the reserved failure shape marking an unhandled query.
///
/// The full shape is `{"notImplemented": true, "message": "..."}`.
pub const NOT_IMPLEMENTED_KEY: &str = "notImplemented";

/// Check whether a failure payload is the reserved `notImplemented` shape.
#[must_use]
pub fn is_not_implemented(error: &Value) -> bool {
    error.get(NOT_IMPLEMENTED_KEY).and_then(Value::as_bool) == Some(true)
}

/// Render a failure payload for humans: strings verbatim, objects with a
/// `message` field by that field, everything else as JSON.
fn describe(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => error.to_string(),
        },
        other => other.to_string(),
    }
}

/// Errors surfaced to the caller of a query.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The receiving side has no handler for the query type.
    #[error("no handler for '{query_type}' query")]
    NotImplemented {
        /// The unhandled query type.
        query_type: String,
    },

    /// The receiving side's handler failed.
    #[error("'{query_type}' query failed: {}", describe(.error))]
    Failed {
        /// The failed query type.
        query_type: String,
        /// The error payload, passed through verbatim.
        error: Value,
    },

    /// The response did not match the type the caller expected.
    #[error("'{query_type}' response does not match the expected type: {reason}")]
    TypeMismatch {
        /// The query type.
        query_type: String,
        /// Decoder diagnostic.
        reason: String,
    },

    /// The messenger was torn down while the query was outstanding.
    #[error("channel destroyed")]
    ChannelDestroyed,

    /// The script environment failed to launch.
    #[error("script launch failed: {0}")]
    LaunchFailed(String),

    /// The evaluation carrying the query could not be run.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// The payload could not be encoded, or the response text decoded.
    #[error("invalid payload: {0}")]
    Payload(#[from] JsonTextError),
}

impl QueryError {
    /// Classify a failure payload received for `query_type`.
    #[must_use]
    pub fn from_failure(query_type: impl Into<String>, error: Value) -> Self {
        let query_type = query_type.into();
        if is_not_implemented(&error) {
            Self::NotImplemented { query_type }
        } else {
            Self::Failed { query_type, error }
        }
    }

    /// Check whether the receiving side had no handler.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

/// Result type for queries.
pub type QueryResult<T> = Result<T, QueryError>;

/// Failure returned by a query handler.
///
/// The wrapped JSON value becomes the `error` field of the response
/// verbatim. It may be a plain string or any JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerError {
    payload: Value,
}

impl HandlerError {
    /// Create an error carrying a plain string.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            payload: Value::String(message.into()),
        }
    }

    /// Create an error carrying an arbitrary JSON value.
    #[must_use]
    pub fn json(payload: Value) -> Self {
        Self { payload }
    }

    /// Create an error from anything displayable.
    #[must_use]
    pub fn from_display(error: &impl fmt::Display) -> Self {
        Self::message(error.to_string())
    }

    /// Create the reserved `notImplemented` failure for `query_type`.
    #[must_use]
    pub fn not_implemented(query_type: &str) -> Self {
        Self {
            payload: json!({
                NOT_IMPLEMENTED_KEY: true,
                "message": format!("no handler for '{query_type}' query"),
            }),
        }
    }

    /// The JSON failure payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consume the error, returning the JSON failure payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(&self.payload))
    }
}

impl std::error::Error for HandlerError {}

impl From<JsonTextError> for HandlerError {
    fn from(err: JsonTextError) -> Self {
        Self::from_display(&err)
    }
}

impl From<QueryError> for HandlerError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotImplemented { query_type } => Self::not_implemented(&query_type),
            QueryError::Failed { error, .. } => Self::json(error),
            other => Self::from_display(&other),
        }
    }
}

/// Errors reported by a script surface.
#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    /// The script engine rejected or failed the evaluation.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// The surface can no longer evaluate scripts.
    #[error("script surface is unavailable")]
    Unavailable,
}

/// Result type for script surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;
