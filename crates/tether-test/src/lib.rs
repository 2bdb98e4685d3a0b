//! Tether Test - Shared test utilities for the Tether query bridge.
//!
//! This crate provides in-process script surfaces and test helpers that can
//! be used across multiple Tether crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tether-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! #[cfg(test)]
//! mod tests {
//!     use tether_messenger::{Messenger, MessengerConfig};
//!     use tether_test::LoopbackSurface;
//!
//!     #[tokio::test]
//!     async fn test_round_trip() {
//!         let (host, page) = LoopbackSurface::pair();
//!         let host = Messenger::new(host, MessengerConfig::default()).unwrap();
//!         let page = Messenger::new(page, MessengerConfig::default()).unwrap();
//!         // ...
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod surfaces;

pub use fixtures::*;
pub use harness::*;
pub use surfaces::*;
