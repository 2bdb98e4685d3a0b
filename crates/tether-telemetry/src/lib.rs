//! Tether Telemetry - logging setup for the Tether query bridge.
//!
//! The messenger only emits `tracing` events; this crate installs the
//! subscriber that decides where they go. Query traffic is traced on the
//! `tether::query` target, so a directive such as `tether::query=off`
//! silences it without touching anything else.
//!
//! # Example
//!
//! ```rust,no_run
//! use tether_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tether_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("tether::query=info");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
