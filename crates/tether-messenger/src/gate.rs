//! Launch gate.
//!
//! Outbound queries must not reach the script side before it has installed
//! its entry points. The gate holds every query until the host signals that
//! the script environment launched, or fails them all if it did not.
//!
//! ```text
//! Pending ──signal_succeeded──▶ Succeeded
//!    │
//!    └────signal_failed───────▶ Failed(error)
//! ```
//!
//! [`LaunchGate::rearm`] starts a fresh `Pending` state for a reloaded
//! surface. Waiters on a superseded gate that never settled are settled
//! together with the new gate, so no waiter is left hanging.

use std::sync::{Mutex, PoisonError};

use tether_core::{QueryError, QueryResult};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Observable launch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchState {
    /// The script environment has not reported yet.
    Pending,
    /// The script environment is ready for queries.
    Succeeded,
    /// The script environment failed to launch.
    Failed(String),
}

impl LaunchState {
    /// Whether the state is terminal.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GateState {
    Launch(LaunchState),
    Closed,
}

impl GateState {
    fn is_pending(&self) -> bool {
        matches!(self, Self::Launch(LaunchState::Pending))
    }
}

#[derive(Debug)]
struct GateInner {
    current: watch::Sender<GateState>,
    superseded: Vec<watch::Sender<GateState>>,
}

/// One-shot readiness gate for outbound queries.
#[derive(Debug)]
pub struct LaunchGate {
    inner: Mutex<GateInner>,
}

impl Default for LaunchGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchGate {
    /// Create a pending gate.
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(GateState::Launch(LaunchState::Pending));
        Self {
            inner: Mutex::new(GateInner {
                current,
                superseded: Vec::new(),
            }),
        }
    }

    /// Current launch state. A closed gate reports `Failed`.
    #[must_use]
    pub fn state(&self) -> LaunchState {
        match &*self.lock().current.borrow() {
            GateState::Launch(state) => state.clone(),
            GateState::Closed => LaunchState::Failed(QueryError::ChannelDestroyed.to_string()),
        }
    }

    /// Mark the launch as succeeded. Returns `false` if the gate had already
    /// settled.
    pub fn signal_succeeded(&self) -> bool {
        self.settle(LaunchState::Succeeded)
    }

    /// Mark the launch as failed. Returns `false` if the gate had already
    /// settled.
    pub fn signal_failed(&self, error: impl Into<String>) -> bool {
        self.settle(LaunchState::Failed(error.into()))
    }

    /// Replace the gate with a fresh pending one.
    pub fn rearm(&self) {
        let mut inner = self.lock();
        let (fresh, _) = watch::channel(GateState::Launch(LaunchState::Pending));
        let old = std::mem::replace(&mut inner.current, fresh);
        if old.borrow().is_pending() {
            inner.superseded.push(old);
        }
        debug!(superseded = inner.superseded.len(), "Launch gate re-armed");
    }

    /// Fail every current and future waiter with a teardown error.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.current.send_replace(GateState::Closed);
        for old in inner.superseded.drain(..) {
            old.send_replace(GateState::Closed);
        }
    }

    /// Wait until the gate settles.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::LaunchFailed`] with the stored error if the
    /// launch failed, or [`QueryError::ChannelDestroyed`] if the gate was
    /// closed.
    pub async fn await_ready(&self) -> QueryResult<()> {
        let mut receiver = self.lock().current.subscribe();
        let state = receiver
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| QueryError::ChannelDestroyed)?
            .clone();

        match state {
            GateState::Launch(LaunchState::Succeeded) => Ok(()),
            GateState::Launch(LaunchState::Failed(error)) => Err(QueryError::LaunchFailed(error)),
            GateState::Launch(LaunchState::Pending) | GateState::Closed => {
                Err(QueryError::ChannelDestroyed)
            },
        }
    }

    fn settle(&self, state: LaunchState) -> bool {
        let mut inner = self.lock();
        let next = GateState::Launch(state);
        let settled = inner.current.send_if_modified(|current| {
            if current.is_pending() {
                *current = next.clone();
                true
            } else {
                false
            }
        });

        if settled {
            for old in inner.superseded.drain(..) {
                old.send_replace(next.clone());
            }
            debug!(state = ?next, "Launch gate settled");
        } else {
            warn!(ignored = ?next, "Launch gate already settled; ignoring signal");
        }
        settled
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_waiters_block_until_success() {
        let gate = Arc::new(LaunchGate::new());
        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.await_ready().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        assert!(gate.signal_succeeded());
        waiter.await.unwrap().unwrap();
        assert_eq!(gate.state(), LaunchState::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let gate = Arc::new(LaunchGate::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.await_ready().await })
            })
            .collect();

        tokio::task::yield_now().await;
        gate.signal_failed("bundle missing");

        for waiter in waiters {
            let err = waiter.await.unwrap().unwrap_err();
            assert!(matches!(err, QueryError::LaunchFailed(ref msg) if msg == "bundle missing"));
        }

        // Later waiters fail immediately.
        assert!(matches!(
            gate.await_ready().await,
            Err(QueryError::LaunchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_transitions_exactly_once() {
        let gate = LaunchGate::new();
        assert!(gate.signal_succeeded());
        assert!(!gate.signal_failed("late"));
        assert!(!gate.signal_succeeded());
        assert_eq!(gate.state(), LaunchState::Succeeded);
    }

    #[tokio::test]
    async fn test_rearm_starts_pending() {
        let gate = LaunchGate::new();
        gate.signal_succeeded();
        gate.rearm();
        assert_eq!(gate.state(), LaunchState::Pending);

        gate.signal_failed("reload failed");
        assert_eq!(
            gate.state(),
            LaunchState::Failed("reload failed".to_string())
        );
    }

    #[tokio::test]
    async fn test_rearm_settles_superseded_waiters() {
        let gate = Arc::new(LaunchGate::new());
        let old_waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.await_ready().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;

        gate.rearm();
        let new_waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.await_ready().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!old_waiter.is_finished());

        gate.signal_succeeded();
        old_waiter.await.unwrap().unwrap();
        new_waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let gate = Arc::new(LaunchGate::new());
        let waiter = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.await_ready().await }
        });
        tokio::task::yield_now().await;

        gate.close();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(QueryError::ChannelDestroyed)
        ));
        assert!(matches!(
            gate.await_ready().await,
            Err(QueryError::ChannelDestroyed)
        ));
    }
}
