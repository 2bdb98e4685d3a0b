//! Shared harness for integration tests.

use std::sync::Arc;
use std::time::Duration;

use tether_messenger::{Messenger, MessengerConfig};
use tether_test::LoopbackSurface;

/// Upper bound for anything a test waits on.
#[allow(dead_code)]
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A host messenger and a page messenger talking over a loopback pair.
///
/// `host` plays the native side, `page` plays the script side.
#[allow(dead_code)]
pub struct Bridge {
    /// Native side.
    pub host: Messenger,
    /// Script side.
    pub page: Messenger,
    /// Surface under the host messenger. Its evaluations carry host traffic.
    pub host_surface: Arc<LoopbackSurface>,
    /// Surface under the page messenger.
    pub page_surface: Arc<LoopbackSurface>,
}

#[allow(dead_code)]
impl Bridge {
    /// Build a bridge with default config. Neither side has launched.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Build a bridge where both sides use `config`.
    pub fn with_config(config: MessengerConfig) -> Self {
        let (host_surface, page_surface) = LoopbackSurface::pair_with_entry_points(
            &config.query_entry_point,
            &config.response_entry_point,
        );
        let host = Messenger::new(host_surface.clone(), config.clone())
            .expect("failed to create host messenger");
        let page = Messenger::new(page_surface.clone(), config)
            .expect("failed to create page messenger");
        Self {
            host,
            page,
            host_surface,
            page_surface,
        }
    }

    /// Build a bridge where both sides have launched.
    pub fn launched() -> Self {
        let bridge = Self::new();
        bridge.host.signal_launch_succeeded();
        bridge.page.signal_launch_succeeded();
        bridge
    }
}

/// Default config with type-mismatch assertions off, so mismatches surface
/// as errors in debug test builds.
#[allow(dead_code)]
pub fn test_config() -> MessengerConfig {
    MessengerConfig::default().without_mismatch_assertions()
}
