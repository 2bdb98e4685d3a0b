//! Messenger error types.

use tether_core::SurfaceId;
use thiserror::Error;

/// Errors from setting up or driving a messenger.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// Another messenger is already bound to this surface.
    #[error("script surface {0} already has a messenger")]
    SurfaceInUse(SurfaceId),

    /// The messenger was created outside a Tokio runtime.
    #[error("no Tokio runtime available: {0}")]
    NoRuntime(String),

    /// The evaluation queue has shut down.
    #[error("evaluation queue is closed")]
    QueueClosed,
}

/// Result type for messenger operations.
pub type MessengerResult<T> = Result<T, MessengerError>;
