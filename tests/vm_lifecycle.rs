// tests/vm_lifecycle.rs

mod common;
use crate::common::FakeVmController;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use buildrig::errors::BuildrigError;
use buildrig::vm::{AddressPolling, LifecyclePhase, PowerState, VmLifecycle};

fn lifecycle(vm: &FakeVmController) -> VmLifecycle {
    let polling = AddressPolling {
        timeout: Duration::from_millis(150),
        interval: Duration::from_millis(5),
    };
    VmLifecycle::new(Arc::new(vm.clone()), "ubuntu-builder", polling)
}

#[tokio::test]
async fn powered_off_vm_is_launched_once_and_powered_down() {
    let vm = FakeVmController::powered_off();
    let mut lc = lifecycle(&vm);
    assert_eq!(lc.phase(), LifecyclePhase::Unknown);

    assert!(lc.power_up().await.unwrap());
    assert!(lc.started_vm());
    assert_eq!(lc.phase(), LifecyclePhase::Running);

    // Already running now, so a second call launches nothing.
    assert!(!lc.power_up().await.unwrap());
    assert_eq!(vm.launches(), 1);
    assert!(lc.started_vm());

    lc.power_down().await.unwrap();
    assert_eq!(vm.power_offs(), 1);
    assert_eq!(vm.power(), PowerState::PoweredOff);
    assert_eq!(lc.phase(), LifecyclePhase::PoweredOff);
    assert!(!lc.started_vm());

    lc.power_down().await.unwrap();
    assert_eq!(vm.power_offs(), 1, "second power_down must be a no-op");
}

#[tokio::test]
async fn running_vm_is_never_launched_or_powered_down() {
    let vm = FakeVmController::running();
    let mut lc = lifecycle(&vm);

    assert!(!lc.power_up().await.unwrap());
    assert!(!lc.power_up().await.unwrap());
    assert!(!lc.started_vm());

    lc.power_down().await.unwrap();
    assert_eq!(vm.launches(), 0);
    assert_eq!(vm.power_offs(), 0);
    assert_eq!(vm.power(), PowerState::Running);
}

#[tokio::test]
async fn failed_launch_leaves_nothing_to_power_down() {
    let vm = FakeVmController::powered_off().fail_launch();
    let mut lc = lifecycle(&vm);

    let err = lc.power_up().await.unwrap_err();
    assert!(matches!(err, BuildrigError::VmControlFailed { .. }), "got {err:?}");
    assert!(!lc.started_vm());
    assert_eq!(lc.phase(), LifecyclePhase::Unknown);

    lc.power_down().await.unwrap();
    assert_eq!(vm.power_offs(), 0);
}

#[tokio::test]
async fn timed_out_launch_that_booted_is_powered_down() {
    let vm = FakeVmController::powered_off().launch_then_time_out();
    let mut lc = lifecycle(&vm);

    let err = lc.power_up().await.unwrap_err();
    assert!(matches!(err, BuildrigError::CommandTimedOut { .. }), "got {err:?}");
    assert!(lc.started_vm());
    assert_eq!(lc.phase(), LifecyclePhase::Starting);

    lc.power_down().await.unwrap();
    assert_eq!(vm.power_offs(), 1);
    assert_eq!(vm.power(), PowerState::PoweredOff);
    assert!(!lc.started_vm());
}

#[tokio::test]
async fn address_is_polled_until_published() {
    let vm = FakeVmController::powered_off()
        .address(Some("10.0.2.15"))
        .address_after_polls(3);
    let mut lc = lifecycle(&vm);
    lc.power_up().await.unwrap();

    let addr = lc.resolve_address().await.unwrap();

    assert_eq!(addr, Ipv4Addr::new(10, 0, 2, 15));
    assert_eq!(vm.polls(), 4);
}

#[tokio::test]
async fn non_ipv4_values_are_ignored_until_timeout() {
    let vm = FakeVmController::running().address(Some("fe80::1"));
    let lc = lifecycle(&vm);

    let err = lc.resolve_address().await.unwrap_err();

    match err {
        BuildrigError::AddressUnavailable { vm: name, .. } => assert_eq!(name, "ubuntu-builder"),
        other => panic!("expected AddressUnavailable, got {other:?}"),
    }
    assert!(vm.polls() > 1);
}

#[tokio::test]
async fn missing_address_times_out() {
    let vm = FakeVmController::running().address(None);
    let lc = lifecycle(&vm);

    let err = lc.resolve_address().await.unwrap_err();
    assert!(matches!(err, BuildrigError::AddressUnavailable { .. }), "got {err:?}");
}
