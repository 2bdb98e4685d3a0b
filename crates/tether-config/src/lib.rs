#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the Tether query bridge.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tether_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("queries go to {}", resolved.config.messenger.query_entry_point);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`TETHER_LOG_LEVEL`, `TETHER_QUERY_LOGGING`,
//!    `TETHER_FULL_QUERY_LOGGING`)
//! 2. **One config file**: the explicit path, `$TETHER_CONFIG`, or the user
//!    config file (`<config dir>/tether/config.toml`)
//! 3. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal tether crates**.
//! Conversion into runtime types happens in the crates that own them.

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a config file is missing or malformed, an
    /// override is invalid, or the final configuration fails validation.
    pub fn load(path: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(path)
    }

    /// Load a single config file over the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
