//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tether_core::prelude::*;` to import all essential types.

// Queries and responses
pub use crate::{Outcome, Payload, Query, QueryId, Response};

// Errors
pub use crate::{HandlerError, QueryError, QueryResult, SurfaceError, SurfaceResult};

// Script surface contracts
pub use crate::{Channel, MessageListener, ScriptSurface, SurfaceId};

// JSON text
pub use crate::json_text::{JsonTextError, JsonTextResult, from_json_text, to_json_text};
