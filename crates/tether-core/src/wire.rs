//! Wire format for the `query` and `queryResponse` channels.
//!
//! ```text
//! query:          { "name": "<type>", "queryId": <int>, "message": <json or absent> }
//! queryResponse:  { "queryId": <int>, "response": <json or absent> }
//!                 { "queryId": <int>, "error": <json or string> }
//! ```
//!
//! `message` and `response` carry the payload as a plain JSON value. An
//! absent field is void; a present `null` is JSON `null`. Messages travel to
//! the other side as an evaluation of `entryPoint('<base64>')`, where the
//! argument is the base64 of the message's JSON text; base64 keeps quotes and
//! control characters out of the script literal.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::json_text::{JsonTextError, from_json_text, to_json_text};
use crate::query::{Outcome, Payload, Query, QueryId, Response};
use crate::surface::Channel;

/// Default script function receiving `query` messages.
pub const DEFAULT_QUERY_ENTRY_POINT: &str = "tetherQuery";

/// Default script function receiving `queryResponse` messages.
pub const DEFAULT_RESPONSE_ENTRY_POINT: &str = "tetherQueryResponse";

/// Errors from encoding or parsing wire messages.
#[derive(Debug, Clone, Error)]
pub enum WireError {
    /// A message was missing a field or had the wrong field types.
    #[error("malformed {channel} message: {reason}")]
    Malformed {
        /// Channel the message arrived on.
        channel: Channel,
        /// What was wrong with it.
        reason: String,
    },

    /// A response carried a usable id but its body was invalid.
    #[error("invalid body in response to query {query_id}: {reason}")]
    InvalidBody {
        /// Id the response was addressed to.
        query_id: QueryId,
        /// What was wrong with the body.
        reason: String,
    },

    /// A script was not of the form `entry('<base64>')`.
    #[error("script is not an entry point call")]
    NotAnEntryCall,

    /// The entry call argument was not valid base64.
    #[error("invalid base64 argument: {0}")]
    Base64(String),

    /// Embedded JSON text was invalid.
    #[error(transparent)]
    Json(#[from] JsonTextError),
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Deserialize a field that is present, keeping `null` as `Some(Value::Null)`.
///
/// Paired with `#[serde(default)]` so only a missing field is `None`.
fn present<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A message on the `query` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMessage {
    /// Query type.
    pub name: String,
    /// Sender-allocated id.
    pub query_id: QueryId,
    /// Payload. Absent means void.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub message: Payload,
}

impl QueryMessage {
    /// Build the wire message for an outbound query.
    #[must_use]
    pub fn from_query(query: &Query) -> Self {
        Self {
            name: query.query_type.clone(),
            query_id: query.id,
            message: query.payload.clone(),
        }
    }

    /// Parse a posted `query` message.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Malformed`] if required fields are missing or
    /// have the wrong type.
    pub fn from_json(body: Value) -> WireResult<Self> {
        serde_json::from_value(body).map_err(|e| WireError::Malformed {
            channel: Channel::Query,
            reason: e.to_string(),
        })
    }

    /// Serialize into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("queryId".to_string(), Value::from(self.query_id.0));
        if let Some(message) = &self.message {
            map.insert("message".to_string(), message.clone());
        }
        Value::Object(map)
    }

    /// Convert into a [`Query`].
    #[must_use]
    pub fn into_query(self) -> Query {
        Query::new(self.query_id, self.name, self.message)
    }
}

/// A message on the `queryResponse` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    /// Id of the query being answered.
    pub query_id: QueryId,
    /// Success or failure.
    pub outcome: Outcome,
}

impl ResponseMessage {
    /// Build the wire message for a response.
    #[must_use]
    pub fn from_response(response: &Response) -> Self {
        Self {
            query_id: response.id,
            outcome: response.outcome.clone(),
        }
    }

    /// Parse a posted `queryResponse` message.
    ///
    /// The presence of an `error` key marks a failure, even when its value
    /// is `null`. A `response` key that is absent is void.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Malformed`] if the message is not an object or
    /// has no valid `queryId`, and [`WireError::InvalidBody`] if the id is
    /// valid but the message carries both `response` and `error`.
    pub fn from_json(body: &Value) -> WireResult<Self> {
        let malformed = |reason: &str| WireError::Malformed {
            channel: Channel::QueryResponse,
            reason: reason.to_string(),
        };

        let object = body.as_object().ok_or_else(|| malformed("expected an object"))?;
        let query_id = object
            .get("queryId")
            .and_then(Value::as_u64)
            .map(QueryId)
            .ok_or_else(|| malformed("missing or invalid queryId"))?;

        let outcome = match (object.get("response"), object.get("error")) {
            (Some(_), Some(_)) => {
                return Err(WireError::InvalidBody {
                    query_id,
                    reason: "both 'response' and 'error' are present".to_string(),
                });
            },
            (_, Some(error)) => Outcome::Failure(error.clone()),
            (response, None) => Outcome::Success(response.cloned()),
        };

        Ok(Self { query_id, outcome })
    }

    /// Serialize into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("queryId".to_string(), Value::from(self.query_id.0));
        match &self.outcome {
            Outcome::Success(None) => {},
            Outcome::Success(Some(value)) => {
                map.insert("response".to_string(), value.clone());
            },
            Outcome::Failure(error) => {
                map.insert("error".to_string(), error.clone());
            },
        }
        Value::Object(map)
    }
}

/// Build the script `entry_point('<base64>')` delivering `message`.
#[must_use]
pub fn entry_call(entry_point: &str, message: &Value) -> String {
    let encoded = STANDARD.encode(to_json_text(&Some(message.clone())));
    format!("{entry_point}('{encoded}')")
}

/// Parse a script built by [`entry_call`], returning the entry point name and
/// the decoded message.
///
/// # Errors
///
/// Returns [`WireError::NotAnEntryCall`] if the script has the wrong shape,
/// [`WireError::Base64`] or [`WireError::Json`] if the argument does not
/// decode.
pub fn parse_entry_call(script: &str) -> WireResult<(String, Value)> {
    let (entry_point, rest) = script
        .trim()
        .split_once("('")
        .ok_or(WireError::NotAnEntryCall)?;
    let encoded = rest.strip_suffix("')").ok_or(WireError::NotAnEntryCall)?;
    if entry_point.is_empty() {
        return Err(WireError::NotAnEntryCall);
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| WireError::Base64(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| JsonTextError::Decode(e.to_string()))?;
    let message = from_json_text(&text)?
        .ok_or_else(|| JsonTextError::Decode("empty entry call argument".to_string()))?;
    Ok((entry_point.to_string(), message))
}
