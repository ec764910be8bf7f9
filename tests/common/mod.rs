#![allow(dead_code, unused_imports)]

pub use buildrig_test_utils::builders;
pub use buildrig_test_utils::fake_transport::{failed, ok, FakeConnector, FakeTransport};
pub use buildrig_test_utils::fake_vm::FakeVmController;
pub use buildrig_test_utils::{init_tracing, within};

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use buildrig::config::RunSettings;
use buildrig::engine::Orchestrator;
use buildrig::fs::mock::MockFileSystem;

/// Fixed batch start so log file names are predictable.
pub fn started_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(9, 30, 15)
        .unwrap()
}

/// Orchestrator over fakes; the log directory lives in a mock filesystem.
pub fn orchestrator(settings: RunSettings, vm: &FakeVmController, connector: &FakeConnector) -> Orchestrator {
    Orchestrator::new(
        settings,
        Arc::new(vm.clone()),
        Arc::new(connector.clone()),
        Arc::new(MockFileSystem::new()),
    )
}
