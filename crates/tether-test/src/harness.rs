//! Test harness helpers.

use std::time::Duration;

use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

/// Set up test logging with the given filter.
///
/// This initializes the tracing subscriber for tests. Should be called
/// at the beginning of tests that need logging.
///
/// # Example
///
/// ```rust,ignore
/// use tether_test::setup_test_logging;
///
/// #[test]
/// fn my_test() {
///     setup_test_logging("tether::query=info");
///     // ... test code
/// }
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if check() {
            return true;
        }
        if deadline.is_none_or(|deadline| Instant::now() >= deadline) {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
