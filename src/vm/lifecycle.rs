// src/vm/lifecycle.rs

//! Idempotent power management for one guest.
//!
//! Phases: `Unknown -> PoweredOff -> Starting -> Running -> PoweringDown -> PoweredOff`.
//! The controller only powers a VM down if it launched it itself, so a guest
//! somebody else started keeps running.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::RunSettings;
use crate::errors::{BuildrigError, Result};
use crate::vm::controller::{PowerState, VmController, GUEST_IPV4_PROPERTY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Unknown,
    PoweredOff,
    Starting,
    Running,
    PoweringDown,
}

/// Polling limits for guest address discovery.
#[derive(Debug, Clone, Copy)]
pub struct AddressPolling {
    pub timeout: Duration,
    pub interval: Duration,
}

impl AddressPolling {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            timeout: settings.address_timeout,
            interval: settings.address_poll_interval,
        }
    }
}

pub struct VmLifecycle {
    controller: Arc<dyn VmController>,
    vm: String,
    polling: AddressPolling,
    phase: LifecyclePhase,
    started_vm: bool,
}

impl VmLifecycle {
    pub fn new(controller: Arc<dyn VmController>, vm: impl Into<String>, polling: AddressPolling) -> Self {
        Self {
            controller,
            vm: vm.into(),
            polling,
            phase: LifecyclePhase::Unknown,
            started_vm: false,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// True only while this controller owns a VM it transitioned from
    /// powered off to running.
    pub fn started_vm(&self) -> bool {
        self.started_vm
    }

    /// Make sure the VM is running. Returns `true` if this call launched it.
    pub async fn power_up(&mut self) -> Result<bool> {
        info!(vm = %self.vm, "powering up virtual machine");

        let state = self.controller.power_state(&self.vm).await?;
        if state == PowerState::Running {
            warn!(vm = %self.vm, "machine already started");
            self.phase = LifecyclePhase::Running;
            return Ok(false);
        }

        self.phase = LifecyclePhase::PoweredOff;
        debug!(vm = %self.vm, ?state, "launching virtual machine");
        self.phase = LifecyclePhase::Starting;
        if let Err(e) = self.controller.launch(&self.vm).await {
            self.adopt_after_failed_launch().await;
            return Err(e);
        }
        self.phase = LifecyclePhase::Running;
        self.started_vm = true;
        info!(vm = %self.vm, "virtual machine launched");
        Ok(true)
    }

    /// A launch that errored (e.g. timed out) may still have started the VM.
    /// Anything other than a stopped state is treated as ours to power down.
    async fn adopt_after_failed_launch(&mut self) {
        let stopped = match self.controller.power_state(&self.vm).await {
            Ok(state) => {
                debug!(vm = %self.vm, ?state, "power state after failed launch");
                matches!(state, PowerState::PoweredOff | PowerState::Saved | PowerState::Aborted)
            }
            Err(e) => {
                warn!(vm = %self.vm, error = %e, "could not query power state after failed launch");
                false
            }
        };

        if stopped {
            self.phase = LifecyclePhase::Unknown;
        } else {
            warn!(vm = %self.vm, "launch failed but the machine may be up; it will be powered down");
            self.phase = LifecyclePhase::Starting;
            self.started_vm = true;
        }
    }

    /// Poll the guest's published IPv4 address until one is available or
    /// the polling timeout passes.
    pub async fn resolve_address(&self) -> Result<Ipv4Addr> {
        let deadline = Instant::now() + self.polling.timeout;

        loop {
            match self.controller.guest_property(&self.vm, GUEST_IPV4_PROPERTY).await? {
                Some(value) => match value.parse::<Ipv4Addr>() {
                    Ok(addr) => {
                        info!(vm = %self.vm, %addr, "guest address resolved");
                        return Ok(addr);
                    }
                    Err(_) => debug!(vm = %self.vm, %value, "ignoring non-IPv4 guest property value"),
                },
                None => debug!(vm = %self.vm, "guest has not published an address yet"),
            }

            if Instant::now() + self.polling.interval > deadline {
                return Err(BuildrigError::AddressUnavailable {
                    vm: self.vm.clone(),
                    secs: self.polling.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.polling.interval).await;
        }
    }

    /// Power the VM off if this controller started it; otherwise a no-op.
    ///
    /// The VM's earlier runtime state (e.g. saved) is not restored.
    pub async fn power_down(&mut self) -> Result<()> {
        if !self.started_vm {
            debug!(vm = %self.vm, "virtual machine was not started by this run; leaving it as is");
            return Ok(());
        }

        info!(vm = %self.vm, "powering down virtual machine");
        self.phase = LifecyclePhase::PoweringDown;
        self.controller.power_off(&self.vm).await?;
        self.phase = LifecyclePhase::PoweredOff;
        self.started_vm = false;
        Ok(())
    }
}

impl std::fmt::Debug for VmLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmLifecycle")
            .field("vm", &self.vm)
            .field("phase", &self.phase)
            .field("started_vm", &self.started_vm)
            .finish()
    }
}
