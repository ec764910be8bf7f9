use std::sync::{Arc, Mutex, MutexGuard};

use buildrig::errors::{BuildrigError, Result};
use buildrig::types::BoxFuture;
use buildrig::vm::{PowerState, VmController, GUEST_IPV4_PROPERTY};

/// A fake hypervisor with a single VM that:
/// - records launches and power-offs
/// - can fail its launch outright, or boot and still report a timeout
/// - publishes its IPv4 address only after a configurable number of polls
#[derive(Clone)]
pub struct FakeVmController {
    state: Arc<Mutex<FakeVm>>,
}

struct FakeVm {
    power: PowerState,
    address: Option<String>,
    polls_before_address: usize,
    polls: usize,
    launches: usize,
    power_offs: usize,
    fail_launch: bool,
    launch_times_out: bool,
}

impl FakeVmController {
    pub fn powered_off() -> Self {
        Self::with_state(PowerState::PoweredOff)
    }

    /// A VM somebody else already started.
    pub fn running() -> Self {
        Self::with_state(PowerState::Running)
    }

    fn with_state(power: PowerState) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeVm {
                power,
                address: Some("192.168.56.101".to_string()),
                polls_before_address: 0,
                polls: 0,
                launches: 0,
                power_offs: 0,
                fail_launch: false,
                launch_times_out: false,
            })),
        }
    }

    /// Guest property value; `None` means the guest never publishes one.
    pub fn address(self, address: Option<&str>) -> Self {
        self.lock().address = address.map(str::to_string);
        self
    }

    /// Return "no value" for the first `polls` property reads.
    pub fn address_after_polls(self, polls: usize) -> Self {
        self.lock().polls_before_address = polls;
        self
    }

    pub fn fail_launch(self) -> Self {
        self.lock().fail_launch = true;
        self
    }

    /// The VM boots, but `launch` still reports a timeout.
    pub fn launch_then_time_out(self) -> Self {
        self.lock().launch_times_out = true;
        self
    }

    pub fn power(&self) -> PowerState {
        self.lock().power.clone()
    }

    pub fn launches(&self) -> usize {
        self.lock().launches
    }

    pub fn power_offs(&self) -> usize {
        self.lock().power_offs
    }

    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    fn lock(&self) -> MutexGuard<'_, FakeVm> {
        self.state.lock().unwrap()
    }
}

impl VmController for FakeVmController {
    fn power_state<'a>(&'a self, _vm: &'a str) -> BoxFuture<'a, Result<PowerState>> {
        Box::pin(async move { Ok(self.lock().power.clone()) })
    }

    fn launch<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut s = self.lock();
            if s.fail_launch {
                return Err(BuildrigError::VmControlFailed {
                    vm: vm.to_string(),
                    reason: "launch refused".to_string(),
                });
            }
            assert_ne!(s.power, PowerState::Running, "launch issued for a running VM");
            s.launches += 1;
            s.power = PowerState::Running;
            if s.launch_times_out {
                return Err(BuildrigError::CommandTimedOut {
                    command: format!("VBoxManage startvm {vm}"),
                    secs: 1,
                });
            }
            Ok(())
        })
    }

    fn power_off<'a>(&'a self, _vm: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.power_offs += 1;
            s.power = PowerState::PoweredOff;
            Ok(())
        })
    }

    fn guest_property<'a>(&'a self, _vm: &'a str, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            assert_eq!(key, GUEST_IPV4_PROPERTY);
            let mut s = self.lock();
            s.polls += 1;
            if s.polls <= s.polls_before_address {
                return Ok(None);
            }
            Ok(s.address.clone())
        })
    }
}
