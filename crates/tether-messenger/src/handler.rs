//! Inbound query handlers.
//!
//! Handlers are type-erased behind [`QueryHandler`] and [`WildcardHandler`].
//! Closures over typed payloads are adapted once, at registration time, by
//! [`TypedHandler`]; the dispatch path only ever sees JSON payloads.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_core::json_text;
use tether_core::{HandlerError, Payload, Query};

/// Result of handling one query.
pub type HandlerResult = Result<Payload, HandlerError>;

/// Handler bound to one exact query type.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    /// Handle a query. The handler may suspend for as long as it needs.
    async fn handle(&self, query: &Query) -> HandlerResult;
}

/// Catch-all handler tried after exact lookup fails.
#[async_trait]
pub trait WildcardHandler: Send + Sync {
    /// Handle the query, or return `None` to let the next handler try.
    async fn try_handle(&self, query: &Query) -> Option<HandlerResult>;
}

/// Adapts `Fn(P) -> Future<Output = Result<R, HandlerError>>` into a
/// [`QueryHandler`].
///
/// The payload is decoded into `P` before the closure runs (void decodes
/// as `null`); a payload that does not fit fails the query with the decoder
/// diagnostic. A `()` result is sent back as void.
pub struct TypedHandler<P, R, F> {
    func: F,
    _marker: PhantomData<fn(P) -> R>,
}

impl<P, R, F> TypedHandler<P, R, F> {
    /// Wrap a closure.
    pub fn new<Fut>(func: F) -> Self
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<R, HandlerError>>,
    {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P, R, F, Fut> QueryHandler for TypedHandler<P, R, F>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, HandlerError>> + Send,
{
    async fn handle(&self, query: &Query) -> HandlerResult {
        let payload: P = json_text::decode(query.payload.clone()).map_err(|e| {
            HandlerError::message(format!("invalid '{}' payload: {e}", query.query_type))
        })?;
        let result = (self.func)(payload).await?;
        Ok(json_text::encode(&result)?)
    }
}

/// Adapts `Fn(Query) -> Future<Output = HandlerResult>` into a
/// [`QueryHandler`] working on raw payloads.
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F> {
    /// Wrap a closure.
    pub fn new<Fut>(func: F) -> Self
    where
        F: Fn(Query) -> Fut,
        Fut: Future<Output = HandlerResult>,
    {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> QueryHandler for FnHandler<F>
where
    F: Fn(Query) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, query: &Query) -> HandlerResult {
        (self.func)(query.clone()).await
    }
}

/// Adapts `Fn(Query) -> Future<Output = Option<HandlerResult>>` into a
/// [`WildcardHandler`].
pub struct FnWildcardHandler<F> {
    func: F,
}

impl<F> FnWildcardHandler<F> {
    /// Wrap a closure.
    pub fn new<Fut>(func: F) -> Self
    where
        F: Fn(Query) -> Fut,
        Fut: Future<Output = Option<HandlerResult>>,
    {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> WildcardHandler for FnWildcardHandler<F>
where
    F: Fn(Query) -> Fut + Send + Sync,
    Fut: Future<Output = Option<HandlerResult>> + Send,
{
    async fn try_handle(&self, query: &Query) -> Option<HandlerResult> {
        (self.func)(query.clone()).await
    }
}
