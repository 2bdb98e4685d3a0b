//! Serialized script evaluation.
//!
//! Embedded browser engines silently drop all but one result when
//! evaluations overlap. Every evaluation against a surface therefore goes
//! through one queue, drained by a single worker task that awaits each
//! evaluation before starting the next.

use std::sync::Arc;

use serde_json::Value;
use tether_core::{ScriptSurface, SurfaceResult};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{MessengerError, MessengerResult};

/// Outcome of one evaluation.
pub type EvaluationResult = SurfaceResult<Option<Value>>;

struct Evaluation {
    script: String,
    responder: Option<oneshot::Sender<EvaluationResult>>,
}

/// FIFO queue of scripts for one surface.
pub struct EvaluationQueue {
    sender: mpsc::UnboundedSender<Evaluation>,
    worker: JoinHandle<()>,
}

impl EvaluationQueue {
    /// Spawn the worker for `surface` on `runtime`.
    #[must_use]
    pub fn spawn(runtime: &Handle, surface: Arc<dyn ScriptSurface>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = runtime.spawn(drain(surface, receiver));
        Self { sender, worker }
    }

    /// Queue a script whose outcome nobody waits for. Failures are logged.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::QueueClosed`] if the worker has stopped.
    pub fn enqueue(&self, script: impl Into<String>) -> MessengerResult<()> {
        self.push(script.into(), None)
    }

    /// Queue a script and get a receiver for its outcome.
    ///
    /// The receiver errors if the queue shuts down before the script runs.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::QueueClosed`] if the worker has stopped.
    pub fn submit(
        &self,
        script: impl Into<String>,
    ) -> MessengerResult<oneshot::Receiver<EvaluationResult>> {
        let (tx, rx) = oneshot::channel();
        self.push(script.into(), Some(tx))?;
        Ok(rx)
    }

    /// Stop the worker. Queued scripts are discarded.
    pub fn shutdown(&self) {
        self.worker.abort();
    }

    /// Whether the worker has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn push(
        &self,
        script: String,
        responder: Option<oneshot::Sender<EvaluationResult>>,
    ) -> MessengerResult<()> {
        self.sender
            .send(Evaluation { script, responder })
            .map_err(|_| MessengerError::QueueClosed)
    }
}

impl Drop for EvaluationQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn drain(
    surface: Arc<dyn ScriptSurface>,
    mut receiver: mpsc::UnboundedReceiver<Evaluation>,
) {
    debug!(surface = %surface.id(), "Evaluation queue started");

    while let Some(Evaluation { script, responder }) = receiver.recv().await {
        trace!(surface = %surface.id(), bytes = script.len(), "Evaluating script");
        let result = surface.evaluate(&script).await;
        if let Err(e) = &result {
            warn!(surface = %surface.id(), error = %e, "Script evaluation failed");
        }
        if let Some(responder) = responder {
            // The waiter may have given up; that is fine.
            let _ = responder.send(result);
        }
    }

    debug!(surface = %surface.id(), "Evaluation queue stopped");
}
