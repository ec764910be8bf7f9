//! Shared test helpers for `buildrig`: config builders, a simulated git
//! transport and a fake hypervisor.

pub mod builders;
pub mod fake_transport;
pub mod fake_vm;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING: Once = Once::new();

/// Route `tracing` output into the test harness's captured output.
///
/// Level comes from `BUILDRIG_TEST_LOG` (an `EnvFilter` directive string),
/// falling back to debug output for this crate only.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = std::env::var("BUILDRIG_TEST_LOG")
            .ok()
            .and_then(|s| EnvFilter::try_new(s).ok())
            .unwrap_or_else(|| EnvFilter::new("buildrig=debug"));

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Fail the test if `fut` has not finished within ten seconds.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("test future did not finish within 10s")
}
