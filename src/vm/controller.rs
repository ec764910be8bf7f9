// src/vm/controller.rs

//! Narrow hypervisor capability used by the lifecycle controller, plus the
//! production implementation driving the `VBoxManage` CLI.

use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::RunSettings;
use crate::errors::{BuildrigError, Result};
use crate::exec::runner::run_captured;
use crate::exec::CommandResult;
use crate::types::BoxFuture;

/// Guest property the VirtualBox guest additions publish the first NIC's
/// IPv4 address under.
pub const GUEST_IPV4_PROPERTY: &str = "/VirtualBox/GuestInfo/Net/0/V4/IP";

/// Power state as reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    PoweredOff,
    Saved,
    Aborted,
    Starting,
    Running,
    Paused,
    Stopping,
    Other(String),
}

impl PowerState {
    /// Parse the `VMState` value of `showvminfo --machinereadable`.
    pub fn from_vbox(value: &str) -> Self {
        match value {
            "poweroff" => PowerState::PoweredOff,
            "saved" => PowerState::Saved,
            "aborted" => PowerState::Aborted,
            "starting" | "restoring" => PowerState::Starting,
            "running" => PowerState::Running,
            "paused" => PowerState::Paused,
            "stopping" => PowerState::Stopping,
            other => PowerState::Other(other.to_string()),
        }
    }
}

/// Hypervisor operations needed to run a guest. Implementations look the
/// machine up by name on every call.
pub trait VmController: Send + Sync {
    fn power_state<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<PowerState>>;

    /// Launch the VM and return once the hypervisor reports the launch done.
    fn launch<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<()>>;

    fn power_off<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Value of a guest property, `None` while the guest has not set it.
    fn guest_property<'a>(&'a self, vm: &'a str, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;
}

/// [`VmController`] backed by `VBoxManage`.
#[derive(Debug, Clone)]
pub struct VBoxManage {
    program: String,
    launch_type: String,
    query_timeout: Duration,
    launch_timeout: Duration,
}

impl VBoxManage {
    pub fn new(settings: &RunSettings) -> Self {
        Self {
            program: "VBoxManage".to_string(),
            launch_type: settings.vm_launch_type.clone(),
            query_timeout: settings.connect_timeout,
            launch_timeout: settings.vm_launch_timeout,
        }
    }

    async fn run_unchecked(&self, vm: &str, args: &[&str], timeout: Duration) -> Result<CommandResult> {
        let label = format!("{} {}", self.program, args.join(" "));
        debug!(vm = %vm, cmd = %label, "running hypervisor command");

        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        run_captured(cmd, timeout, &label).await.map_err(|e| match e {
            BuildrigError::IoError(io) => BuildrigError::VmControlFailed {
                vm: vm.to_string(),
                reason: format!("cannot run {}: {io}", self.program),
            },
            other => other,
        })
    }

    async fn run(&self, vm: &str, args: &[&str], timeout: Duration) -> Result<CommandResult> {
        let result = self.run_unchecked(vm, args, timeout).await?;
        if !result.success() {
            let label = format!("{} {}", self.program, args.join(" "));
            return Err(BuildrigError::VmControlFailed {
                vm: vm.to_string(),
                reason: format!("`{label}` exited with status {}: {}", result.status, result.stderr.trim()),
            });
        }
        Ok(result)
    }
}

impl VmController for VBoxManage {
    fn power_state<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<PowerState>> {
        Box::pin(async move {
            let result = self
                .run(vm, &["showvminfo", vm, "--machinereadable"], self.query_timeout)
                .await?;
            parse_vm_state(&result.stdout).ok_or_else(|| BuildrigError::VmControlFailed {
                vm: vm.to_string(),
                reason: "showvminfo output has no VMState".to_string(),
            })
        })
    }

    fn launch<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.run(vm, &["startvm", vm, "--type", self.launch_type.as_str()], self.launch_timeout)
                .await?;
            Ok(())
        })
    }

    fn power_off<'a>(&'a self, vm: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.run(vm, &["controlvm", vm, "poweroff"], self.launch_timeout).await?;
            Ok(())
        })
    }

    fn guest_property<'a>(&'a self, vm: &'a str, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let result = self
                .run_unchecked(vm, &["guestproperty", "get", vm, key], self.query_timeout)
                .await?;
            // Some releases exit nonzero while the property is still unset.
            if !result.success() && !result.stdout.contains("No value set") {
                return Err(BuildrigError::VmControlFailed {
                    vm: vm.to_string(),
                    reason: format!("guestproperty get {key} exited with status {}: {}", result.status, result.stderr.trim()),
                });
            }
            Ok(parse_guest_property(&result.stdout))
        })
    }
}

/// Extract `VMState="..."` from `showvminfo --machinereadable`.
pub fn parse_vm_state(output: &str) -> Option<PowerState> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("VMState=")?;
        Some(PowerState::from_vbox(value.trim_matches('"')))
    })
}

/// `guestproperty get` prints `Value: <v>` or `No value set!`.
pub fn parse_guest_property(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("Value:")?.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
