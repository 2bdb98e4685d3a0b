//! Outbound query correlation.
//!
//! Maps each outstanding outbound query id to the channel that completes
//! its caller. Responses can arrive long after the query was sent (the
//! script side may be waiting on the user), so entries live in a table
//! rather than in a continuation.
//!
//! Flow:
//! 1. `allocate_id()` hands out the next id
//! 2. `register()` stores a pending entry and returns a [`PendingResponse`]
//! 3. The query is delivered to the script side
//! 4. The response listener calls `resolve()` with the matching id
//! 5. The caller awaits [`PendingResponse::wait`]
//!
//! Dropping a [`PendingResponse`] before it resolves (a caller that timed
//! out or was aborted) removes its entry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tether_core::{Outcome, QueryError, QueryId, QueryResult};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type PendingMap = DashMap<QueryId, PendingQuery>;

struct PendingQuery {
    query_type: String,
    sender: oneshot::Sender<QueryResult<Outcome>>,
    created_at: Instant,
}

/// Receiver half of a registered query.
#[derive(Debug)]
pub struct PendingResponse {
    id: QueryId,
    receiver: oneshot::Receiver<QueryResult<Outcome>>,
    table: Weak<PendingMap>,
}

impl PendingResponse {
    /// The query id this response belongs to.
    #[must_use]
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Wait for the response.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ChannelDestroyed`] if the table was closed or
    /// dropped first, or the error the entry was resolved with.
    pub async fn wait(mut self) -> QueryResult<Outcome> {
        (&mut self.receiver)
            .await
            .unwrap_or(Err(QueryError::ChannelDestroyed))
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        // Resolved and closed entries are already gone.
        if let Some(table) = self.table.upgrade()
            && table.remove(&self.id).is_some()
        {
            debug!(query_id = %self.id, "Abandoned pending query removed");
        }
    }
}

/// Table of outstanding outbound queries.
pub struct CorrelationTable {
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    closed: AtomicBool,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    /// Create an empty table. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Allocate the next id. Ids strictly increase and are never reused.
    pub fn allocate_id(&self) -> QueryId {
        QueryId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a pending entry for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ChannelDestroyed`] if the table is closed.
    pub fn register(&self, id: QueryId, query_type: &str) -> QueryResult<PendingResponse> {
        if self.is_closed() {
            return Err(QueryError::ChannelDestroyed);
        }

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            id,
            PendingQuery {
                query_type: query_type.to_string(),
                sender,
                created_at: Instant::now(),
            },
        );

        // `close()` may have drained between the check and the insert.
        if self.is_closed() {
            self.pending.remove(&id);
            return Err(QueryError::ChannelDestroyed);
        }

        debug!(query_id = %id, query_type, "Registered pending query");
        Ok(PendingResponse {
            id,
            receiver,
            table: Arc::downgrade(&self.pending),
        })
    }

    /// Complete the entry for `id` and remove it.
    ///
    /// Returns `false` (with a warning) for unknown or already-resolved ids.
    pub fn resolve(&self, id: QueryId, result: QueryResult<Outcome>) -> bool {
        let Some((_, pending)) = self.pending.remove(&id) else {
            warn!(query_id = %id, "Response for unknown or already resolved query");
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        if pending.sender.send(result).is_err() {
            debug!(
                query_id = %id,
                query_type = %pending.query_type,
                "Query caller went away before its response arrived"
            );
            return false;
        }

        debug!(
            query_id = %id,
            query_type = %pending.query_type,
            elapsed_ms = duration_ms(elapsed),
            "Resolved pending query"
        );
        true
    }

    /// Drop the entry for `id` without completing it.
    pub fn cancel(&self, id: QueryId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Type of the outstanding query `id`, if any.
    #[must_use]
    pub fn query_type(&self, id: QueryId) -> Option<String> {
        self.pending.get(&id).map(|entry| entry.query_type.clone())
    }

    /// Fail every pending entry with [`QueryError::ChannelDestroyed`] and
    /// refuse new registrations. Returns how many entries were failed.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<QueryId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed: usize = 0;
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.sender.send(Err(QueryError::ChannelDestroyed));
                failed = failed.saturating_add(1);
            }
        }
        failed
    }

    /// Whether the table refuses new registrations.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of outstanding queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no queries are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
