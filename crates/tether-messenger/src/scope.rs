//! Owner-scoped handler registrations.
//!
//! Short-lived host components register handlers while they are alive and
//! must take all of them down together. A [`HandlerScope`] tracks every
//! token it issues and unregisters them on [`HandlerScope::unregister_all`]
//! or on drop.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_core::HandlerError;
use tracing::debug;

use crate::dispatch::{DispatchTable, HandlerToken};
use crate::handler::{QueryHandler, TypedHandler, WildcardHandler};

/// A group of handler registrations removed together.
pub struct HandlerScope {
    handlers: Arc<DispatchTable>,
    tokens: Mutex<Vec<HandlerToken>>,
}

impl HandlerScope {
    pub(crate) fn new(handlers: Arc<DispatchTable>) -> Self {
        Self {
            handlers,
            tokens: Mutex::new(Vec::new()),
        }
    }

    /// Register a typed handler for `query_type` within this scope.
    pub fn register_handler<P, R, F, Fut>(&self, query_type: &str, handler: F) -> HandlerToken
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.register_query_handler(query_type, Arc::new(TypedHandler::new(handler)))
    }

    /// Register a type-erased handler for `query_type` within this scope.
    pub fn register_query_handler(
        &self,
        query_type: &str,
        handler: Arc<dyn QueryHandler>,
    ) -> HandlerToken {
        self.track(self.handlers.register(query_type, handler))
    }

    /// Register a wildcard handler within this scope.
    pub fn register_wildcard_handler(&self, handler: Arc<dyn WildcardHandler>) -> HandlerToken {
        self.track(self.handlers.register_wildcard(handler))
    }

    /// Unregister one handler of this scope.
    pub fn unregister_handler(&self, token: &HandlerToken) -> bool {
        self.tokens().retain(|tracked| tracked != token);
        self.handlers.unregister(token)
    }

    /// Unregister every handler of this scope. Returns how many were still
    /// registered.
    pub fn unregister_all(&self) -> usize {
        let tokens = std::mem::take(&mut *self.tokens());
        let removed = tokens
            .iter()
            .filter(|token| self.handlers.unregister(token))
            .count();
        if removed > 0 {
            debug!(removed, "Handler scope unregistered its handlers");
        }
        removed
    }

    /// Number of registrations tracked by this scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens().len()
    }

    /// Whether the scope tracks no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens().is_empty()
    }

    fn track(&self, token: HandlerToken) -> HandlerToken {
        self.tokens().push(token.clone());
        token
    }

    fn tokens(&self) -> MutexGuard<'_, Vec<HandlerToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HandlerScope {
    fn drop(&mut self) {
        self.unregister_all();
    }
}
