//! Shared helpers for `taskdag` tests: scripted work, graph and task-file
//! builders, tracing setup and a deadline wrapper.

pub mod builders;
pub mod fake_work;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING: Once = Once::new();

/// Deadline used by [`with_timeout`].
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

/// Install a test-captured tracing subscriber once per test binary.
///
/// Directives come from `TASKDAG_LOG` (same variable as the binary), then
/// `RUST_LOG`, then `taskdag=debug,warn`. Output only shows for failing
/// tests unless run with `--nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env("TASKDAG_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("taskdag=debug,warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, failing the test if it outlives [`TEST_DEADLINE`].
pub async fn with_timeout<F: Future>(f: F) -> F::Output {
    with_deadline(TEST_DEADLINE, f).await
}

/// Await `f`, failing the test if it outlives `limit`.
pub async fn with_deadline<F: Future>(limit: Duration, f: F) -> F::Output {
    match tokio::time::timeout(limit, f).await {
        Ok(out) => out,
        Err(_) => panic!("test did not finish within {limit:?}"),
    }
}
