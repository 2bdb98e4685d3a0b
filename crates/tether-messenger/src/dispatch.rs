//! Inbound query dispatch.
//!
//! Exact handlers are keyed by query type and take precedence. Wildcard
//! handlers are tried in registration order when no exact handler exists;
//! the first one that claims the query wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tether_core::Query;
use tracing::{debug, trace};

use crate::handler::{HandlerResult, QueryHandler, WildcardHandler};

/// Unique id of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Exact(String),
    Wildcard,
}

/// Handle for removing a registration.
///
/// A token only ever removes the registration it was issued for. If an
/// exact handler was replaced by a later registration for the same type,
/// the stale token is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "dropping the token makes the handler impossible to unregister"]
pub struct HandlerToken {
    id: HandlerId,
    kind: TokenKind,
}

impl HandlerToken {
    /// The registration id.
    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// The query type for exact registrations, `None` for wildcards.
    #[must_use]
    pub fn query_type(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Exact(query_type) => Some(query_type),
            TokenKind::Wildcard => None,
        }
    }
}

/// Result of dispatching one inbound query.
#[derive(Debug)]
pub enum Dispatch {
    /// A handler claimed the query.
    Handled(HandlerResult),
    /// No handler claimed the query.
    Unhandled,
}

#[derive(Default)]
struct Handlers {
    exact: HashMap<String, (HandlerId, Arc<dyn QueryHandler>)>,
    wildcard: Vec<(HandlerId, Arc<dyn WildcardHandler>)>,
}

/// Registry of inbound query handlers.
pub struct DispatchTable {
    next_id: AtomicU64,
    inner: RwLock<Handlers>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.read();
        let mut types: Vec<&String> = handlers.exact.keys().collect();
        types.sort();
        f.debug_struct("DispatchTable")
            .field("exact", &types)
            .field("wildcard", &handlers.wildcard.len())
            .finish()
    }
}

impl DispatchTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: RwLock::new(Handlers::default()),
        }
    }

    /// Register `handler` for `query_type`, replacing any existing handler
    /// for that type.
    pub fn register(
        &self,
        query_type: impl Into<String>,
        handler: Arc<dyn QueryHandler>,
    ) -> HandlerToken {
        let query_type = query_type.into();
        let id = self.next_id();
        let replaced = self
            .write()
            .exact
            .insert(query_type.clone(), (id, handler))
            .is_some();

        if replaced {
            debug!(query_type = %query_type, handler_id = %id, "Replaced query handler");
        } else {
            debug!(query_type = %query_type, handler_id = %id, "Registered query handler");
        }
        HandlerToken {
            id,
            kind: TokenKind::Exact(query_type),
        }
    }

    /// Append a wildcard handler.
    pub fn register_wildcard(&self, handler: Arc<dyn WildcardHandler>) -> HandlerToken {
        let id = self.next_id();
        self.write().wildcard.push((id, handler));
        debug!(handler_id = %id, "Registered wildcard handler");
        HandlerToken {
            id,
            kind: TokenKind::Wildcard,
        }
    }

    /// Remove the registration behind `token`. Returns `false` if it is
    /// already gone or was replaced.
    pub fn unregister(&self, token: &HandlerToken) -> bool {
        let mut handlers = self.write();
        let removed = match &token.kind {
            TokenKind::Exact(query_type) => {
                if handlers
                    .exact
                    .get(query_type)
                    .is_some_and(|(id, _)| *id == token.id)
                {
                    handlers.exact.remove(query_type);
                    true
                } else {
                    false
                }
            },
            TokenKind::Wildcard => {
                let before = handlers.wildcard.len();
                handlers.wildcard.retain(|(id, _)| *id != token.id);
                handlers.wildcard.len() != before
            },
        };
        drop(handlers);

        if removed {
            debug!(handler_id = %token.id, query_type = ?token.query_type(), "Unregistered handler");
        }
        removed
    }

    /// Remove every handler.
    pub fn clear(&self) {
        let mut handlers = self.write();
        handlers.exact.clear();
        handlers.wildcard.clear();
    }

    /// Whether an exact handler exists for `query_type`.
    #[must_use]
    pub fn has_handler(&self, query_type: &str) -> bool {
        self.read().exact.contains_key(query_type)
    }

    /// Number of registrations, exact and wildcard.
    #[must_use]
    pub fn len(&self) -> usize {
        let handlers = self.read();
        handlers.exact.len().saturating_add(handlers.wildcard.len())
    }

    /// Whether no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route `query` to its handler.
    ///
    /// The lock is only held while snapshotting the handlers, so handlers
    /// may register or unregister others while they run.
    pub async fn dispatch(&self, query: &Query) -> Dispatch {
        let (exact, wildcards) = {
            let handlers = self.read();
            let exact = handlers
                .exact
                .get(&query.query_type)
                .map(|(_, handler)| Arc::clone(handler));
            let wildcards: Vec<Arc<dyn WildcardHandler>> = if exact.is_some() {
                Vec::new()
            } else {
                handlers
                    .wildcard
                    .iter()
                    .map(|(_, handler)| Arc::clone(handler))
                    .collect()
            };
            (exact, wildcards)
        };

        if let Some(handler) = exact {
            trace!(query_id = %query.id, query_type = %query.query_type, "Dispatching to exact handler");
            return Dispatch::Handled(handler.handle(query).await);
        }

        for handler in wildcards {
            if let Some(result) = handler.try_handle(query).await {
                trace!(query_id = %query.id, query_type = %query.query_type, "Wildcard handler claimed query");
                return Dispatch::Handled(result);
            }
        }

        Dispatch::Unhandled
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Handlers> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Handlers> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
