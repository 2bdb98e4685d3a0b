//! Query and response types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A query payload or result.
///
/// `None` is void (no value at all) and is kept distinct from
/// `Some(Value::Null)`.
pub type Payload = Option<Value>;

/// Identifier of a query, unique per sending side of one messenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An asynchronous operation request crossing the host/script boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Identifier allocated by the sending side.
    pub id: QueryId,
    /// Type name of the operation (e.g. `echo`).
    pub query_type: String,
    /// Operation payload.
    pub payload: Payload,
}

impl Query {
    /// Create a new query.
    #[must_use]
    pub fn new(id: QueryId, query_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            id,
            query_type: query_type.into(),
            payload,
        }
    }
}

/// Result carried by a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The handler completed with a value (or void).
    Success(Payload),
    /// The handler failed. The payload is a JSON error value or a plain string.
    Failure(Value),
}

impl Outcome {
    /// Check whether this outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// The outcome correlated to one query id.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the originating query.
    pub id: QueryId,
    /// Success or failure.
    pub outcome: Outcome,
}

impl Response {
    /// Create a success response.
    #[must_use]
    pub fn success(id: QueryId, payload: Payload) -> Self {
        Self {
            id,
            outcome: Outcome::Success(payload),
        }
    }

    /// Create a failure response.
    #[must_use]
    pub fn failure(id: QueryId, error: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Failure(error),
        }
    }
}
