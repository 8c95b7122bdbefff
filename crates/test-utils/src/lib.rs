pub mod builders;
pub mod fake_pool;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Set up the tracing subscriber once for a whole test binary.
///
/// Output goes through `with_test_writer()`, so each test's logs stay
/// attached to that test and only show up when it fails (or under
/// `-- --nocapture`). Filter with the same env var the library uses:
/// `TASKMESH_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TASKMESH_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound a future to 5 seconds so a stalled scheduler run fails the test
/// instead of hanging the suite.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}
