//! Shared helpers for the `dockyard` integration tests.
//!
//! - [`builders`]: terse construction of containers, tasks and config files
//! - [`fake_executor`]: a scriptable stand-in for the docker step executor
//! - [`recording_logger`]: an event logger that remembers what it was told

pub mod builders;
pub mod fake_executor;
pub mod recording_logger;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConfigFileBuilder, ContainerBuilder, TaskBuilder};
pub use fake_executor::FakeStepExecutor;
pub use recording_logger::RecordingEventLogger;

static INIT: Once = Once::new();

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a tracing subscriber for tests, once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests (or with `-- --nocapture`). The filter comes from `DOCKYARD_LOG`,
/// e.g. `DOCKYARD_LOG=dockyard::engine=trace cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env("DOCKYARD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `future`, failing the test if a task run hangs.
pub async fn with_timeout<F, T>(future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("test timed out after 5 seconds; a step or the scheduler is stuck")
}
