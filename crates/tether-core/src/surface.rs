//! Script surface contracts.
//!
//! A script surface is the embedded script environment a host can submit
//! code to and receive named messages from. The host implements
//! [`ScriptSurface`]; the messenger implements [`MessageListener`].
//!
//! The surface keeps only a [`Weak`] reference to its listener. The
//! messenger owns the surface outright, so no reference cycle forms.

use std::fmt;
use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::SurfaceResult;

/// Stable identifier of a script surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    /// Create a new random surface id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named message channel posted from the script side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// An inbound query.
    Query,
    /// A response to one of our outbound queries.
    QueryResponse,
}

impl Channel {
    /// Wire name of the channel.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::QueryResponse => "queryResponse",
        }
    }

    /// Look up a channel by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "query" => Some(Self::Query),
            "queryResponse" => Some(Self::QueryResponse),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver for messages posted by the script side.
pub trait MessageListener: Send + Sync {
    /// Called by the host's message bridge for every posted message.
    ///
    /// `channel` is the raw channel name; unknown names are the listener's
    /// problem to report.
    fn on_message(&self, channel: &str, body: Value);
}

/// The embedded script environment.
///
/// Implementations must hop to whatever thread the engine requires inside
/// [`evaluate`](Self::evaluate). Callers never evaluate concurrently against
/// one surface; the messenger's evaluation queue serializes every call.
#[async_trait]
pub trait ScriptSurface: Send + Sync {
    /// Stable id used to enforce one messenger per surface.
    fn id(&self) -> SurfaceId;

    /// Evaluate a script and return its completion value, if any.
    async fn evaluate(&self, script: &str) -> SurfaceResult<Option<Value>>;

    /// Install the listener for messages posted from the script side.
    fn set_message_listener(&self, listener: Weak<dyn MessageListener>);

    /// Remove the installed listener.
    fn clear_message_listener(&self) {}
}
