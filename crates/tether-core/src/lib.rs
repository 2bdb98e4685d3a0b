//! Tether Core - shared contracts for the Tether host/script query bridge.
//!
//! This crate provides:
//! - Query, response and outcome types shared by both directions
//! - JSON text conversion that keeps void distinct from `null`
//! - The `query` / `queryResponse` wire format and `entry('<base64>')` calls
//! - The error taxonomy surfaced to query callers and handlers
//! - The [`ScriptSurface`] and [`MessageListener`] traits a host implements
//!
//! # Example
//!
//! ```rust
//! use tether_core::json_text::{from_json_text, to_json_text};
//! use serde_json::json;
//!
//! let text = to_json_text(&Some(json!({"a": 1})));
//! assert_eq!(from_json_text(&text).unwrap(), Some(json!({"a": 1})));
//!
//! // Void is the empty string, never "null".
//! assert_eq!(to_json_text(&None), "");
//! assert_eq!(from_json_text("").unwrap(), None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod json_text;
pub mod prelude;
pub mod wire;

mod error;
mod query;
mod surface;

pub use error::{
    HandlerError, NOT_IMPLEMENTED_KEY, QueryError, QueryResult, SurfaceError, SurfaceResult,
    is_not_implemented,
};
pub use query::{Outcome, Payload, Query, QueryId, Response};
pub use surface::{Channel, MessageListener, ScriptSurface, SurfaceId};
