//! In-process script surfaces.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tether_core::wire::{
    DEFAULT_QUERY_ENTRY_POINT, DEFAULT_RESPONSE_ENTRY_POINT, parse_entry_call,
};
use tether_core::{Channel, MessageListener, ScriptSurface, SurfaceError, SurfaceId, SurfaceResult};
use tracing::trace;

use crate::harness::eventually;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deliver(listener: &Mutex<Option<Weak<dyn MessageListener>>>, channel: &str, body: Value) -> bool {
    let listener = lock(listener).as_ref().and_then(Weak::upgrade);
    match listener {
        Some(listener) => {
            listener.on_message(channel, body);
            true
        },
        None => {
            trace!(channel, "No listener installed; message dropped");
            false
        },
    }
}

/// One end of a connected surface pair.
///
/// Every evaluation is decoded as an `entry('<base64>')` call and posted to
/// the peer's listener on the channel the entry point stands for, so two
/// messengers on a pair talk to each other exactly as a host and its page
/// would.
pub struct LoopbackSurface {
    id: SurfaceId,
    query_entry_point: String,
    response_entry_point: String,
    listener: Mutex<Option<Weak<dyn MessageListener>>>,
    peer: Mutex<Weak<LoopbackSurface>>,
    evaluations: AtomicUsize,
}

impl LoopbackSurface {
    /// Create a connected pair using the default entry points.
    #[must_use]
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        Self::pair_with_entry_points(DEFAULT_QUERY_ENTRY_POINT, DEFAULT_RESPONSE_ENTRY_POINT)
    }

    /// Create a connected pair for custom entry points.
    #[must_use]
    pub fn pair_with_entry_points(
        query_entry_point: &str,
        response_entry_point: &str,
    ) -> (Arc<Self>, Arc<Self>) {
        let a = Arc::new(Self::new(query_entry_point, response_entry_point));
        let b = Arc::new(Self::new(query_entry_point, response_entry_point));
        *lock(&a.peer) = Arc::downgrade(&b);
        *lock(&b.peer) = Arc::downgrade(&a);
        (a, b)
    }

    fn new(query_entry_point: &str, response_entry_point: &str) -> Self {
        Self {
            id: SurfaceId::new(),
            query_entry_point: query_entry_point.to_string(),
            response_entry_point: response_entry_point.to_string(),
            listener: Mutex::new(None),
            peer: Mutex::new(Weak::new()),
            evaluations: AtomicUsize::new(0),
        }
    }

    /// Number of evaluations run on this end.
    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    /// Post a message to this end's own listener.
    pub fn post(&self, channel: &str, body: Value) -> bool {
        deliver(&self.listener, channel, body)
    }

    fn channel_for(&self, entry_point: &str) -> Option<Channel> {
        if entry_point == self.query_entry_point {
            Some(Channel::Query)
        } else if entry_point == self.response_entry_point {
            Some(Channel::QueryResponse)
        } else {
            None
        }
    }
}

#[async_trait]
impl ScriptSurface for LoopbackSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    async fn evaluate(&self, script: &str) -> SurfaceResult<Option<Value>> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);

        let (entry_point, message) =
            parse_entry_call(script).map_err(|e| SurfaceError::Evaluation(e.to_string()))?;
        let channel = self.channel_for(&entry_point).ok_or_else(|| {
            SurfaceError::Evaluation(format!("{entry_point} is not defined"))
        })?;
        let peer = lock(&self.peer).upgrade().ok_or(SurfaceError::Unavailable)?;

        peer.post(channel.name(), message);
        Ok(None)
    }

    fn set_message_listener(&self, listener: Weak<dyn MessageListener>) {
        *lock(&self.listener) = Some(listener);
    }

    fn clear_message_listener(&self) {
        *lock(&self.listener) = None;
    }
}

/// Surface that records every script and never answers on its own.
///
/// Tests inspect what was evaluated and play the script side by hand with
/// [`RecordingSurface::post`].
#[derive(Default)]
pub struct RecordingSurface {
    id: SurfaceId,
    scripts: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
    listener: Mutex<Option<Weak<dyn MessageListener>>>,
}

impl RecordingSurface {
    /// Create a recording surface.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every following evaluation with `message`, or stop failing.
    pub fn set_failure(&self, message: Option<&str>) {
        *lock(&self.failure) = message.map(str::to_string);
    }

    /// Scripts evaluated so far, in order.
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        lock(&self.scripts).clone()
    }

    /// Evaluated scripts decoded into `(entry point, message)`.
    ///
    /// Scripts that are not entry calls are skipped.
    #[must_use]
    pub fn messages(&self) -> Vec<(String, Value)> {
        self.scripts()
            .iter()
            .filter_map(|script| parse_entry_call(script).ok())
            .collect()
    }

    /// Wait until at least `count` scripts were evaluated.
    ///
    /// Returns the decoded messages, or `None` on timeout.
    pub async fn wait_for_messages(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Option<Vec<(String, Value)>> {
        eventually(timeout, || lock(&self.scripts).len() >= count)
            .await
            .then(|| self.messages())
    }

    /// Post a message to the installed listener, as the script side would.
    pub fn post(&self, channel: &str, body: Value) -> bool {
        deliver(&self.listener, channel, body)
    }

    /// Whether a listener is installed.
    #[must_use]
    pub fn has_listener(&self) -> bool {
        lock(&self.listener)
            .as_ref()
            .is_some_and(|listener| listener.strong_count() > 0)
    }
}

#[async_trait]
impl ScriptSurface for RecordingSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    async fn evaluate(&self, script: &str) -> SurfaceResult<Option<Value>> {
        lock(&self.scripts).push(script.to_string());
        match lock(&self.failure).clone() {
            Some(message) => Err(SurfaceError::Evaluation(message)),
            None => Ok(None),
        }
    }

    fn set_message_listener(&self, listener: Weak<dyn MessageListener>) {
        *lock(&self.listener) = Some(listener);
    }

    fn clear_message_listener(&self) {
        *lock(&self.listener) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::wire::entry_call;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<(String, Value)>>,
    }

    impl MessageListener for Collector {
        fn on_message(&self, channel: &str, body: Value) {
            lock(&self.seen).push((channel.to_string(), body));
        }
    }

    #[tokio::test]
    async fn test_loopback_delivers_to_peer() {
        let (a, b) = LoopbackSurface::pair();
        let collector = Arc::new(Collector::default());
        let weak: Weak<Collector> = Arc::downgrade(&collector);
        let listener: Weak<dyn MessageListener> = weak;
        b.set_message_listener(listener);

        let body = json!({"name": "echo", "queryId": 1});
        a.evaluate(&entry_call("tetherQuery", &body)).await.unwrap();
        a.evaluate(&entry_call("tetherQueryResponse", &json!({"queryId": 2})))
            .await
            .unwrap();

        let seen = lock(&collector.seen).clone();
        assert_eq!(seen[0], ("query".to_string(), body));
        assert_eq!(seen[1].0, "queryResponse");
        assert_eq!(a.evaluations(), 2);
    }

    #[tokio::test]
    async fn test_loopback_rejects_unknown_entry_point() {
        let (a, _b) = LoopbackSurface::pair();
        let result = a.evaluate(&entry_call("somethingElse", &json!({}))).await;
        assert!(matches!(result, Err(SurfaceError::Evaluation(_))));
        assert!(a.evaluate("1 + 1").await.is_err());
    }

    #[tokio::test]
    async fn test_loopback_without_peer_is_unavailable() {
        let (a, b) = LoopbackSurface::pair();
        drop(b);
        let result = a.evaluate(&entry_call("tetherQuery", &json!({}))).await;
        assert!(matches!(result, Err(SurfaceError::Unavailable)));
    }

    #[tokio::test]
    async fn test_recording_surface() {
        let surface = RecordingSurface::new();
        surface
            .evaluate(&entry_call("tetherQuery", &json!({"queryId": 1})))
            .await
            .unwrap();

        surface.set_failure(Some("engine gone"));
        assert!(surface.evaluate("x").await.is_err());
        surface.set_failure(None);

        assert_eq!(surface.scripts().len(), 2);
        let messages = surface
            .wait_for_messages(1, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(messages, vec![("tetherQuery".to_string(), json!({"queryId": 1}))]);
        assert!(!surface.has_listener());
    }
}
