//! JSON text conversion with a distinct void value.
//!
//! Void (`None`) encodes to the empty string instead of `"null"`, and the
//! empty (or whitespace-only) string decodes back to void. Every other JSON value, including
//! bare scalars and `null`, round-trips unchanged.

use std::any::TypeId;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::query::Payload;

/// Errors from JSON text conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonTextError {
    /// A non-empty string was not valid JSON.
    #[error("invalid JSON text: {0}")]
    Decode(String),

    /// A value could not be represented as JSON.
    #[error("value cannot be encoded as JSON: {0}")]
    Encode(String),

    /// Valid JSON did not have the expected shape.
    #[error("unexpected JSON shape: {0}")]
    Shape(String),
}

/// Result type for JSON text conversion.
pub type JsonTextResult<T> = Result<T, JsonTextError>;

/// Encode a payload as JSON text. Void becomes the empty string.
#[must_use]
pub fn to_json_text(payload: &Payload) -> String {
    match payload {
        None => String::new(),
        Some(value) => value.to_string(),
    }
}

/// Decode JSON text into a payload. Empty or whitespace-only text is void.
///
/// # Errors
///
/// Returns [`JsonTextError::Decode`] if a non-empty string is not valid JSON.
pub fn from_json_text(text: &str) -> JsonTextResult<Payload> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| JsonTextError::Decode(e.to_string()))
}

/// Encode a typed value as a payload. `()` encodes as void.
///
/// # Errors
///
/// Returns [`JsonTextError::Encode`] if the value's `Serialize` impl fails
/// (for example a map with non-string keys).
pub fn encode<T: Serialize + 'static>(value: &T) -> JsonTextResult<Payload> {
    if TypeId::of::<T>() == TypeId::of::<()>() {
        return Ok(None);
    }
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| JsonTextError::Encode(e.to_string()))
}

/// Decode a payload into a typed value. Void decodes as `null`, so it
/// satisfies `()` and `Option<T>`.
///
/// # Errors
///
/// Returns [`JsonTextError::Shape`] if the payload does not match `T`.
pub fn decode<T: DeserializeOwned>(payload: Payload) -> JsonTextResult<T> {
    serde_json::from_value(payload.unwrap_or(Value::Null))
        .map_err(|e| JsonTextError::Shape(e.to_string()))
}

/// Render a payload for full-detail logs.
#[must_use]
pub fn pretty(payload: &Payload) -> String {
    match payload {
        None => "<void>".to_string(),
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
    }
}
