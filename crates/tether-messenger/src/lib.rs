//! Tether Messenger - bidirectional query bridge between a host and an
//! embedded script surface.
//!
//! This crate provides:
//! - [`Messenger`], which sends queries to the script side and answers the
//!   queries it sends back
//! - A serialized evaluation queue, since script engines lose results when
//!   evaluations overlap
//! - A launch gate holding outbound queries until the script side is ready
//! - Correlation of outbound queries with their responses, in any order
//! - Exact and wildcard handler dispatch for inbound queries
//! - Query tracing on the `tether::query` target
//!
//! # Example
//!
//! ```rust
//! use serde_json::{Value, json};
//! use tether_messenger::{Messenger, MessengerConfig};
//! use tether_test::LoopbackSurface;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // Two surfaces wired to each other stand in for a host and its page.
//! let (host_surface, page_surface) = LoopbackSurface::pair();
//! let host = Messenger::new(host_surface, MessengerConfig::default()).unwrap();
//! let page = Messenger::new(page_surface, MessengerConfig::default()).unwrap();
//!
//! let _echo = page.register_handler("echo", |payload: Value| async move { Ok(payload) });
//! host.signal_launch_succeeded();
//!
//! let reply: Value = host.send_query("echo", Some(json!({"a": 1}))).await.unwrap();
//! assert_eq!(reply, json!({"a": 1}));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;
pub mod registry;

mod config;
mod correlation;
mod dispatch;
mod error;
mod eval_queue;
mod gate;
mod handler;
mod messenger;
mod query_log;
mod scope;

pub use config::{
    DEFAULT_QUERY_ENTRY_POINT, DEFAULT_RESPONSE_ENTRY_POINT, MessengerConfig, QueryLogConfig,
};
pub use correlation::{CorrelationTable, PendingResponse};
pub use dispatch::{Dispatch, DispatchTable, HandlerId, HandlerToken};
pub use error::{MessengerError, MessengerResult};
pub use eval_queue::{EvaluationQueue, EvaluationResult};
pub use gate::{LaunchGate, LaunchState};
pub use handler::{
    FnHandler, FnWildcardHandler, HandlerResult, QueryHandler, TypedHandler, WildcardHandler,
};
pub use messenger::{ErrorHandler, Messenger};
pub use query_log::{Direction, QUERY_LOG_TARGET, QueryLog};
pub use scope::HandlerScope;
