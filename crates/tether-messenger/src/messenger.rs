//! The messenger: both directions of the query bridge over one surface.
//!
//! Outbound, [`Messenger::send_query`] waits for the launch gate, registers
//! a correlation entry, delivers the query through the evaluation queue and
//! waits for the matching `queryResponse` message. Inbound, messages posted
//! on the `query` channel are routed through the dispatch table on their own
//! task and answered through the evaluation queue.
//!
//! Dropping the messenger tears it down: pending outbound queries fail with
//! [`QueryError::ChannelDestroyed`], running inbound handlers are abandoned
//! and the surface is released for another messenger.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tether_core::json_text::{self, JsonTextError};
use tether_core::wire::{QueryMessage, ResponseMessage, WireError, entry_call};
use tether_core::{
    Channel, HandlerError, MessageListener, Outcome, Payload, Query, QueryError, QueryId,
    QueryResult, Response, ScriptSurface, SurfaceId,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MessengerConfig;
use crate::correlation::CorrelationTable;
use crate::dispatch::{Dispatch, DispatchTable, HandlerToken};
use crate::error::{MessengerError, MessengerResult};
use crate::eval_queue::EvaluationQueue;
use crate::gate::{LaunchGate, LaunchState};
use crate::handler::{QueryHandler, TypedHandler, WildcardHandler};
use crate::query_log::{Direction, QueryLog};
use crate::registry::{self, SurfaceBinding};
use crate::scope::HandlerScope;

/// Callback receiving failures of [`Messenger::send_query_and_show_error`].
pub type ErrorHandler = Arc<dyn Fn(&str, &QueryError) + Send + Sync>;

fn default_error_handler() -> ErrorHandler {
    Arc::new(|query_type: &str, err: &QueryError| {
        warn!(query_type, error = %err, "Query failed");
    })
}

/// Bidirectional query bridge bound to one script surface.
pub struct Messenger {
    inner: Arc<MessengerInner>,
}

struct MessengerInner {
    this: Weak<MessengerInner>,
    surface: Arc<dyn ScriptSurface>,
    binding: Mutex<Option<SurfaceBinding>>,
    config: MessengerConfig,
    queue: EvaluationQueue,
    gate: LaunchGate,
    outbound: CorrelationTable,
    handlers: Arc<DispatchTable>,
    log: QueryLog,
    error_handler: RwLock<ErrorHandler>,
    runtime: Handle,
    cancel: CancellationToken,
    destroyed: AtomicBool,
}

impl Messenger {
    /// Bind a messenger to `surface`.
    ///
    /// Must be called from within a Tokio runtime; the evaluation worker and
    /// inbound handlers run on it.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::NoRuntime`] outside a runtime, or
    /// [`MessengerError::SurfaceInUse`] if another messenger holds the
    /// surface.
    pub fn new(surface: Arc<dyn ScriptSurface>, config: MessengerConfig) -> MessengerResult<Self> {
        let runtime = Handle::try_current().map_err(|e| MessengerError::NoRuntime(e.to_string()))?;
        let binding = registry::bind(surface.id())?;

        let inner = Arc::new_cyclic(|this| MessengerInner {
            this: this.clone(),
            queue: EvaluationQueue::spawn(&runtime, Arc::clone(&surface)),
            surface: Arc::clone(&surface),
            binding: Mutex::new(Some(binding)),
            log: QueryLog::new(&config.logging),
            config,
            gate: LaunchGate::new(),
            outbound: CorrelationTable::new(),
            handlers: Arc::new(DispatchTable::new()),
            error_handler: RwLock::new(default_error_handler()),
            runtime,
            cancel: CancellationToken::new(),
            destroyed: AtomicBool::new(false),
        });

        let weak: Weak<MessengerInner> = Arc::downgrade(&inner);
        let listener: Weak<dyn MessageListener> = weak;
        surface.set_message_listener(listener);

        info!(surface = %surface.id(), "Messenger bound to script surface");
        Ok(Self { inner })
    }

    /// Id of the bound surface.
    #[must_use]
    pub fn surface_id(&self) -> SurfaceId {
        self.inner.surface.id()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &MessengerConfig {
        &self.inner.config
    }

    /// Query logger, for toggling flags at runtime.
    #[must_use]
    pub fn query_log(&self) -> &QueryLog {
        &self.inner.log
    }

    /// Number of outbound queries waiting for a response.
    #[must_use]
    pub fn pending_queries(&self) -> usize {
        self.inner.outbound.len()
    }

    // --- Outbound ---

    /// Send a query and decode its response into `R`.
    ///
    /// The returned future does not borrow the messenger. It fails with
    /// [`QueryError::ChannelDestroyed`] if the messenger is dropped first.
    ///
    /// # Errors
    ///
    /// The future resolves to the launch failure, the remote handler's
    /// failure ([`QueryError::NotImplemented`] if it had none), a teardown
    /// error, or [`QueryError::TypeMismatch`] if the response does not
    /// decode into `R`.
    pub fn send_query<R>(
        &self,
        query_type: &str,
        payload: Payload,
    ) -> impl Future<Output = QueryResult<R>> + Send + use<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let query_type = query_type.to_string();
        async move {
            let response = inner.query(&query_type, payload).await?;
            inner.decode_response(&query_type, response)
        }
    }

    /// Send a query and return its response payload without decoding it.
    ///
    /// Unlike `send_query::<Payload>`, a JSON `null` response stays distinct
    /// from void.
    ///
    /// # Errors
    ///
    /// As [`send_query`](Self::send_query), except that no type mismatch is
    /// possible.
    pub fn send_query_raw(
        &self,
        query_type: &str,
        payload: Payload,
    ) -> impl Future<Output = QueryResult<Payload>> + Send + use<> {
        let inner = Arc::clone(&self.inner);
        let query_type = query_type.to_string();
        async move { inner.query(&query_type, payload).await }
    }

    /// Serialize `payload` and send it as a query.
    ///
    /// # Errors
    ///
    /// As [`send_query`](Self::send_query), plus [`QueryError::Payload`] if
    /// `payload` does not serialize. Nothing is sent in that case.
    pub fn send_query_with<P, R>(
        &self,
        query_type: &str,
        payload: &P,
    ) -> impl Future<Output = QueryResult<R>> + Send + use<P, R>
    where
        P: Serialize + 'static,
        R: DeserializeOwned + Send + 'static,
    {
        let encoded = json_text::encode(payload);
        let inner = Arc::clone(&self.inner);
        let query_type = query_type.to_string();
        async move {
            let response = inner.query(&query_type, encoded?).await?;
            inner.decode_response(&query_type, response)
        }
    }

    /// Like [`send_query`](Self::send_query), but failures are also passed to
    /// the error handler before being returned.
    ///
    /// # Errors
    ///
    /// As [`send_query`](Self::send_query).
    pub fn send_query_and_show_error<R>(
        &self,
        query_type: &str,
        payload: Payload,
    ) -> impl Future<Output = QueryResult<R>> + Send + use<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let query = self.send_query::<R>(query_type, payload);
        let query_type = query_type.to_string();
        async move {
            let result = query.await;
            if let Err(err) = &result {
                inner.show_error(&query_type, err);
            }
            result
        }
    }

    /// Send a one-way notification.
    ///
    /// The query runs on its own task. Any response value is discarded and
    /// [`QueryError::NotImplemented`] counts as success, since notifications
    /// often target optional listeners. Other failures are logged and
    /// returned through the handle.
    pub fn send(&self, query_type: &str, payload: Payload) -> JoinHandle<QueryResult<()>> {
        let inner = Arc::clone(&self.inner);
        let query_type = query_type.to_string();
        self.inner.runtime.spawn(async move {
            match inner.query(&query_type, payload).await {
                Ok(_) => Ok(()),
                Err(err) if err.is_not_implemented() => {
                    debug!(query_type = %query_type, "Notification had no listener");
                    Ok(())
                },
                Err(err) => {
                    warn!(query_type = %query_type, error = %err, "Notification failed");
                    Err(err)
                },
            }
        })
    }

    /// Replace the callback used by
    /// [`send_query_and_show_error`](Self::send_query_and_show_error).
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &QueryError) + Send + Sync + 'static,
    {
        *self
            .inner
            .error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(handler);
    }

    // --- Inbound ---

    /// Register a typed handler for `query_type`.
    ///
    /// The payload is decoded into `P` before `handler` runs. A payload that
    /// does not decode fails the query with the decoder diagnostic. Returning
    /// `()` answers with void.
    ///
    /// Registering a second handler for the same type replaces the first.
    pub fn register_handler<P, R, F, Fut>(&self, query_type: &str, handler: F) -> HandlerToken
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.register_query_handler(query_type, Arc::new(TypedHandler::new(handler)))
    }

    /// Register a type-erased handler for `query_type`.
    pub fn register_query_handler(
        &self,
        query_type: &str,
        handler: Arc<dyn QueryHandler>,
    ) -> HandlerToken {
        self.inner.handlers.register(query_type, handler)
    }

    /// Register a wildcard handler, tried after exact lookup fails.
    pub fn register_wildcard_handler(&self, handler: Arc<dyn WildcardHandler>) -> HandlerToken {
        self.inner.handlers.register_wildcard(handler)
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn unregister_handler(&self, token: &HandlerToken) -> bool {
        self.inner.handlers.unregister(token)
    }

    /// Start a group of registrations that are removed together.
    #[must_use]
    pub fn scope(&self) -> HandlerScope {
        HandlerScope::new(Arc::clone(&self.inner.handlers))
    }

    /// Feed a message posted by the script side on `channel`.
    ///
    /// Surfaces normally deliver messages through the installed
    /// [`MessageListener`]; this is the same entry point.
    pub fn receive_inbound(&self, channel: &str, body: Value) {
        self.inner.receive(channel, body);
    }

    /// Send the outcome of inbound query `id` back to the script side.
    ///
    /// # Errors
    ///
    /// Returns [`MessengerError::QueueClosed`] if the messenger is shutting
    /// down.
    pub fn respond(&self, id: QueryId, query_type: &str, outcome: Outcome) -> MessengerResult<()> {
        self.inner.respond(id, query_type, outcome)
    }

    // --- Launch ---

    /// Release queries held by the launch gate.
    pub fn signal_launch_succeeded(&self) -> bool {
        self.inner.gate.signal_succeeded()
    }

    /// Fail every held and future query with `error`.
    pub fn signal_launch_failed(&self, error: impl Into<String>) -> bool {
        self.inner.gate.signal_failed(error)
    }

    /// Hold new queries again until the next launch signal, e.g. after the
    /// surface reloaded.
    pub fn rearm_launch(&self) {
        self.inner.gate.rearm();
    }

    /// Current launch state.
    #[must_use]
    pub fn launch_state(&self) -> LaunchState {
        self.inner.gate.state()
    }
}

impl fmt::Debug for Messenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messenger")
            .field("surface", &self.inner.surface.id())
            .field("launch", &self.inner.gate.state())
            .field("pending", &self.inner.outbound.len())
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

impl Drop for Messenger {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl MessengerInner {
    async fn query(&self, query_type: &str, payload: Payload) -> QueryResult<Payload> {
        self.gate.await_ready().await?;
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(QueryError::ChannelDestroyed);
        }

        let id = self.outbound.allocate_id();
        let pending = self.outbound.register(id, query_type)?;
        let query = Query::new(id, query_type, payload);
        self.log.log_query(Direction::HostToScript, &query);

        let script = entry_call(
            &self.config.query_entry_point,
            &QueryMessage::from_query(&query).to_json(),
        );
        // Every early return drops `pending`, which removes the entry.
        let evaluated = match self.queue.submit(script) {
            Ok(receiver) => receiver.await,
            Err(_) => return Err(QueryError::ChannelDestroyed),
        };
        match evaluated {
            Ok(Ok(_)) => {},
            Ok(Err(e)) => return Err(QueryError::Evaluation(e.to_string())),
            Err(_) => return Err(QueryError::ChannelDestroyed),
        }

        match pending.wait().await? {
            Outcome::Success(payload) => Ok(payload),
            Outcome::Failure(error) => Err(QueryError::from_failure(query_type, error)),
        }
    }

    fn decode_response<R: DeserializeOwned>(
        &self,
        query_type: &str,
        payload: Payload,
    ) -> QueryResult<R> {
        json_text::decode(payload).map_err(|e| {
            let reason = e.to_string();
            error!(
                query_type,
                reason = %reason,
                "Response does not match the expected type; host and script disagree on the contract"
            );
            debug_assert!(
                !self.config.assert_on_type_mismatch,
                "'{query_type}' response does not match the expected type: {reason}"
            );
            QueryError::TypeMismatch {
                query_type: query_type.to_string(),
                reason,
            }
        })
    }

    fn show_error(&self, query_type: &str, err: &QueryError) {
        let handler = Arc::clone(
            &self
                .error_handler
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );
        handler(query_type, err);
    }

    fn receive(&self, channel: &str, body: Value) {
        if self.destroyed.load(Ordering::SeqCst) {
            debug!(channel, "Dropping message posted after teardown");
            return;
        }
        match Channel::from_name(channel) {
            Some(Channel::Query) => self.receive_query(body),
            Some(Channel::QueryResponse) => self.receive_response(&body),
            None => warn!(channel, "Message on unknown channel dropped"),
        }
    }

    fn receive_query(&self, body: Value) {
        let query = match QueryMessage::from_json(body).map(QueryMessage::into_query) {
            Ok(query) => query,
            Err(e) => {
                warn!(error = %e, "Malformed inbound query dropped");
                return;
            },
        };
        self.log.log_query(Direction::ScriptToHost, &query);

        let Some(this) = self.this.upgrade() else {
            return;
        };
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(query_id = %query.id, query_type = %query.query_type, "Inbound query abandoned at teardown");
                },
                () = this.answer(&query) => {},
            }
        });
    }

    async fn answer(&self, query: &Query) {
        let outcome = match self.handlers.dispatch(query).await {
            Dispatch::Handled(Ok(payload)) => Outcome::Success(payload),
            Dispatch::Handled(Err(err)) => Outcome::Failure(err.into_payload()),
            Dispatch::Unhandled => {
                warn!(query_id = %query.id, query_type = %query.query_type, "No handler for inbound query");
                Outcome::Failure(HandlerError::not_implemented(&query.query_type).into_payload())
            },
        };

        if let Err(e) = self.respond(query.id, &query.query_type, outcome) {
            debug!(query_id = %query.id, error = %e, "Response not delivered");
        }
    }

    fn respond(&self, id: QueryId, query_type: &str, outcome: Outcome) -> MessengerResult<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(MessengerError::QueueClosed);
        }
        self.log
            .log_response(Direction::HostToScript, id, query_type, &outcome);

        let response = Response { id, outcome };
        let script = entry_call(
            &self.config.response_entry_point,
            &ResponseMessage::from_response(&response).to_json(),
        );
        self.queue.enqueue(script)
    }

    fn receive_response(&self, body: &Value) {
        let (id, result) = match ResponseMessage::from_json(body) {
            Ok(message) => (message.query_id, Ok(message.outcome)),
            Err(WireError::InvalidBody { query_id, reason }) => (
                query_id,
                Err(QueryError::Payload(JsonTextError::Shape(reason))),
            ),
            Err(e) => {
                warn!(error = %e, "Malformed query response dropped");
                return;
            },
        };

        let Some(query_type) = self.outbound.query_type(id) else {
            warn!(query_id = %id, "Response for unknown or already resolved query");
            return;
        };

        match &result {
            Ok(outcome) => {
                self.log
                    .log_response(Direction::ScriptToHost, id, &query_type, outcome);
            },
            Err(e) => {
                warn!(query_id = %id, query_type = %query_type, error = %e, "Invalid query response");
            },
        }
        self.outbound.resolve(id, result);
    }

    fn teardown(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.surface.clear_message_listener();
        self.gate.close();
        let failed = self.outbound.close();
        self.handlers.clear();
        self.cancel.cancel();
        self.queue.shutdown();
        self.binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        info!(surface = %self.surface.id(), failed_queries = failed, "Messenger torn down");
    }
}

impl MessageListener for MessengerInner {
    fn on_message(&self, channel: &str, body: Value) {
        self.receive(channel, body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tether_core::wire::parse_entry_call;
    use tether_core::{SurfaceError, SurfaceResult};

    /// Surface that records scripts and lets tests post messages back.
    #[derive(Default)]
    struct ScriptedSurface {
        id: SurfaceId,
        scripts: Mutex<Vec<String>>,
        listener: Mutex<Option<Weak<dyn MessageListener>>>,
        fail: AtomicBool,
    }

    impl ScriptedSurface {
        fn scripts(&self) -> Vec<String> {
            self.scripts.lock().unwrap().clone()
        }

        fn post(&self, channel: &str, body: Value) {
            let listener = self.listener.lock().unwrap().clone();
            if let Some(listener) = listener.and_then(|l| l.upgrade()) {
                listener.on_message(channel, body);
            }
        }
    }

    #[async_trait]
    impl ScriptSurface for ScriptedSurface {
        fn id(&self) -> SurfaceId {
            self.id
        }

        async fn evaluate(&self, script: &str) -> SurfaceResult<Option<Value>> {
            self.scripts.lock().unwrap().push(script.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(SurfaceError::Evaluation("engine gone".to_string()));
            }
            Ok(None)
        }

        fn set_message_listener(&self, listener: Weak<dyn MessageListener>) {
            *self.listener.lock().unwrap() = Some(listener);
        }

        fn clear_message_listener(&self) {
            *self.listener.lock().unwrap() = None;
        }
    }

    fn setup() -> (Arc<ScriptedSurface>, Messenger) {
        let surface = Arc::new(ScriptedSurface::default());
        let messenger = Messenger::new(
            surface.clone(),
            MessengerConfig::default().without_mismatch_assertions(),
        )
        .unwrap();
        (surface, messenger)
    }

    async fn wait_for_scripts(surface: &ScriptedSurface, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let scripts = surface.scripts();
            if scripts.len() >= count {
                return scripts;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("expected {count} scripts, got {:?}", surface.scripts());
    }

    #[tokio::test]
    async fn test_outbound_query_round_trip() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let query = tokio::spawn(messenger.send_query::<Value>("echo", Some(json!({"a": 1}))));
        let scripts = wait_for_scripts(&surface, 1).await;

        let (entry_point, message) = parse_entry_call(&scripts[0]).unwrap();
        assert_eq!(entry_point, "tetherQuery");
        assert_eq!(message["name"], "echo");
        assert_eq!(message["message"], json!({"a": 1}));

        let id = message["queryId"].clone();
        surface.post("queryResponse", json!({"queryId": id, "response": {"a": 1}}));
        assert_eq!(query.await.unwrap().unwrap(), json!({"a": 1}));
        assert_eq!(messenger.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_failure_response_is_classified() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let ghost = tokio::spawn(messenger.send_query::<Value>("ghost", None));
        let failing = tokio::spawn(messenger.send_query::<Value>("failing", None));
        let scripts = wait_for_scripts(&surface, 2).await;

        for script in scripts {
            let (_, message) = parse_entry_call(&script).unwrap();
            let error = if message["name"] == "ghost" {
                json!({"notImplemented": true, "message": "no handler"})
            } else {
                json!("disk full")
            };
            surface.post(
                "queryResponse",
                json!({"queryId": message["queryId"], "error": error}),
            );
        }

        assert!(ghost.await.unwrap().unwrap_err().is_not_implemented());
        match failing.await.unwrap() {
            Err(QueryError::Failed { error, .. }) => assert_eq!(error, json!("disk full")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let query = tokio::spawn(messenger.send_query::<u32>("count", None));
        let scripts = wait_for_scripts(&surface, 1).await;
        let (_, message) = parse_entry_call(&scripts[0]).unwrap();
        surface.post(
            "queryResponse",
            json!({"queryId": message["queryId"], "response": "many"}),
        );

        assert!(matches!(
            query.await.unwrap(),
            Err(QueryError::TypeMismatch { ref query_type, .. }) if query_type == "count"
        ));
    }

    #[tokio::test]
    async fn test_queries_wait_for_launch() {
        let (surface, messenger) = setup();
        let query = tokio::spawn(messenger.send_query::<()>("early", None));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(surface.scripts().is_empty());

        messenger.signal_launch_succeeded();
        let scripts = wait_for_scripts(&surface, 1).await;
        let (_, message) = parse_entry_call(&scripts[0]).unwrap();
        assert!(message.get("message").is_none());
        surface.post("queryResponse", json!({"queryId": message["queryId"]}));
        query.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_launch_failure_schedules_nothing() {
        let (surface, messenger) = setup();
        let early = tokio::spawn(messenger.send_query::<Value>("early", None));
        tokio::task::yield_now().await;

        messenger.signal_launch_failed("bundle missing");
        let late = messenger.send_query::<Value>("late", None).await;

        for result in [early.await.unwrap(), late] {
            assert!(matches!(result, Err(QueryError::LaunchFailed(ref e)) if e == "bundle missing"));
        }
        assert!(surface.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_evaluation_failure_fails_query() {
        let (surface, messenger) = setup();
        surface.fail.store(true, Ordering::SeqCst);
        messenger.signal_launch_succeeded();

        let result = messenger.send_query::<Value>("echo", None).await;
        assert!(matches!(result, Err(QueryError::Evaluation(_))));
        assert_eq!(messenger.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_inbound_query_is_answered() {
        let (surface, messenger) = setup();
        let _token = messenger.register_handler("double", |n: i64| async move {
            Ok(n.saturating_mul(2))
        });

        surface.post("query", json!({"name": "double", "queryId": 4, "message": 21}));
        let scripts = wait_for_scripts(&surface, 1).await;
        let (entry_point, message) = parse_entry_call(&scripts[0]).unwrap();
        assert_eq!(entry_point, "tetherQueryResponse");
        assert_eq!(message, json!({"queryId": 4, "response": 42}));
    }

    #[tokio::test]
    async fn test_inbound_string_and_object_payloads() {
        let (surface, messenger) = setup();
        let _echo = messenger.register_handler("echo", |payload: Value| async move { Ok(payload) });

        surface.post("query", json!({"name": "echo", "queryId": 5, "message": "hello"}));
        surface.post("query", json!({"name": "echo", "queryId": 6, "message": {"k": [1, 2]}}));
        let scripts = wait_for_scripts(&surface, 2).await;

        let mut responses: Vec<Value> = scripts
            .iter()
            .map(|script| parse_entry_call(script).unwrap().1)
            .collect();
        responses.sort_by_key(|message| message["queryId"].as_u64());
        assert_eq!(
            responses,
            [
                json!({"queryId": 5, "response": "hello"}),
                json!({"queryId": 6, "response": {"k": [1, 2]}}),
            ]
        );
    }

    #[tokio::test]
    async fn test_outbound_raw_response_values() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let number = tokio::spawn(messenger.send_query::<u32>("count", Some(json!("all"))));
        let text = tokio::spawn(messenger.send_query::<String>("name", None));
        let scripts = wait_for_scripts(&surface, 2).await;

        for script in scripts {
            let (_, message) = parse_entry_call(&script).unwrap();
            let response = if message["name"] == "count" {
                assert_eq!(message["message"], "all");
                json!(3)
            } else {
                json!("tether")
            };
            surface.post(
                "queryResponse",
                json!({"queryId": message["queryId"], "response": response}),
            );
        }

        assert_eq!(number.await.unwrap().unwrap(), 3);
        assert_eq!(text.await.unwrap().unwrap(), "tether");
        assert_eq!(messenger.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_raw_query_keeps_null_distinct_from_void() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let null = tokio::spawn(messenger.send_query_raw("null", None));
        let void = tokio::spawn(messenger.send_query_raw("void", None));
        let scripts = wait_for_scripts(&surface, 2).await;
        for script in scripts {
            let (_, message) = parse_entry_call(&script).unwrap();
            let body = if message["name"] == "null" {
                json!({"queryId": message["queryId"], "response": null})
            } else {
                json!({"queryId": message["queryId"]})
            };
            surface.post("queryResponse", body);
        }

        assert_eq!(null.await.unwrap().unwrap(), Some(Value::Null));
        assert_eq!(void.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_response_body_resolves_waiter() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let query = tokio::spawn(messenger.send_query::<Value>("echo", None));
        let scripts = wait_for_scripts(&surface, 1).await;
        let (_, message) = parse_entry_call(&scripts[0]).unwrap();
        surface.post(
            "queryResponse",
            json!({"queryId": message["queryId"], "response": 1, "error": "both"}),
        );

        assert!(matches!(query.await.unwrap(), Err(QueryError::Payload(_))));
        assert_eq!(messenger.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_callers_leave_no_entries() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        for _ in 0..5 {
            let query = messenger.send_query::<Value>("neverAnswered", None);
            let waited = tokio::time::timeout(Duration::from_millis(20), query).await;
            assert!(waited.is_err());
        }
        wait_for_scripts(&surface, 5).await;
        assert_eq!(messenger.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_unhandled_inbound_query_gets_not_implemented() {
        let (surface, messenger) = setup();
        surface.post("query", json!({"name": "ghost", "queryId": 9}));

        let scripts = wait_for_scripts(&surface, 1).await;
        let (_, message) = parse_entry_call(&scripts[0]).unwrap();
        assert_eq!(message["queryId"], 9);
        assert_eq!(message["error"]["notImplemented"], true);
        drop(messenger);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let (surface, messenger) = setup();
        surface.post("query", json!({"queryId": 1}));
        surface.post("queryResponse", json!({"response": 1}));
        surface.post("queryResponse", json!({"queryId": 77, "response": 1}));
        surface.post("bogus", json!({}));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(surface.scripts().is_empty());
        drop(messenger);
    }

    #[tokio::test]
    async fn test_teardown_fails_pending_queries() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let query = tokio::spawn(messenger.send_query::<Value>("neverAnswered", None));
        wait_for_scripts(&surface, 1).await;
        let id = surface.id;
        drop(messenger);

        assert!(matches!(
            query.await.unwrap(),
            Err(QueryError::ChannelDestroyed)
        ));
        assert!(!registry::is_bound(id));
    }

    #[tokio::test]
    async fn test_one_messenger_per_surface() {
        let (surface, messenger) = setup();
        let second = Messenger::new(surface.clone(), MessengerConfig::default());
        assert!(matches!(second, Err(MessengerError::SurfaceInUse(_))));

        drop(messenger);
        assert!(Messenger::new(surface, MessengerConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_show_error_routes_to_handler() {
        let (_surface, messenger) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        messenger.set_error_handler({
            let seen = Arc::clone(&seen);
            move |query_type: &str, err: &QueryError| {
                seen.lock().unwrap().push(format!("{query_type}: {err}"));
            }
        });

        messenger.signal_launch_failed("offline");
        let result = messenger
            .send_query_and_show_error::<Value>("status", None)
            .await;
        assert!(result.is_err());
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["status: script launch failed: offline"]
        );
    }

    #[tokio::test]
    async fn test_send_suppresses_not_implemented() {
        let (surface, messenger) = setup();
        messenger.signal_launch_succeeded();

        let notification = messenger.send("optional", Some(json!(1)));
        let scripts = wait_for_scripts(&surface, 1).await;
        let (_, message) = parse_entry_call(&scripts[0]).unwrap();
        surface.post(
            "queryResponse",
            json!({"queryId": message["queryId"], "error": {"notImplemented": true}}),
        );
        notification.await.unwrap().unwrap();
    }
}
