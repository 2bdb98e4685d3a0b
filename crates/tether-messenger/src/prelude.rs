//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tether_messenger::prelude::*;` to import all essential types.

// Messenger
pub use crate::{Messenger, MessengerConfig, MessengerError, MessengerResult, QueryLogConfig};

// Handlers
pub use crate::{
    FnHandler, FnWildcardHandler, HandlerResult, HandlerScope, HandlerToken, QueryHandler,
    WildcardHandler,
};

// Launch
pub use crate::LaunchState;

// Core types
pub use tether_core::prelude::*;
