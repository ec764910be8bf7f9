// src/engine/state.rs

use std::net::Ipv4Addr;

use chrono::NaiveDateTime;

use crate::config::MachineConfig;
use crate::errors::{BuildrigError, Result};
use crate::exec::CommandTransport;
use crate::vm::VmLifecycle;

/// Timestamp format embedded in build log file names.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `<make_path>/<YYYY-MM-DD HH:MM>_<machine>_output`.
pub fn log_file_path(make_path: &str, machine: &str, at: NaiveDateTime) -> String {
    format!(
        "{}/{}_{}_output",
        make_path.trim_end_matches(['/', '\\']),
        at.format(LOG_TIMESTAMP_FORMAT),
        machine
    )
}

/// Mutable state of one machine run. Owned by exactly one orchestration
/// run and never shared across machines.
pub struct MachineRuntimeState {
    /// Guest address; `None` in local mode.
    pub address: Option<Ipv4Addr>,
    pub log_path: String,
    pub(crate) transport: Option<Box<dyn CommandTransport>>,
    pub(crate) vm: Option<VmLifecycle>,
    torn_down: bool,
}

impl MachineRuntimeState {
    pub fn new(machine: &MachineConfig, started_at: NaiveDateTime) -> Self {
        Self {
            address: None,
            log_path: log_file_path(&machine.make_path, &machine.name, started_at),
            transport: None,
            vm: None,
            torn_down: false,
        }
    }

    /// Whether this run launched the guest (and so must power it down).
    pub fn started_vm(&self) -> bool {
        self.vm.as_ref().is_some_and(VmLifecycle::started_vm)
    }

    pub(crate) fn mark_torn_down(&mut self) {
        self.torn_down = true;
    }

    /// The open transport. Fails once the run has been torn down or before
    /// a session was established.
    pub fn transport_mut(&mut self) -> Result<&mut dyn CommandTransport> {
        if self.torn_down {
            return Err(BuildrigError::Other(anyhow::anyhow!(
                "machine run already torn down"
            )));
        }
        match self.transport.as_mut() {
            Some(transport) => Ok(transport.as_mut()),
            None => Err(BuildrigError::Other(anyhow::anyhow!(
                "no transport session established"
            ))),
        }
    }
}

impl std::fmt::Debug for MachineRuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineRuntimeState")
            .field("address", &self.address)
            .field("log_path", &self.log_path)
            .field("connected", &self.transport.is_some())
            .field("vm", &self.vm)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 42)
            .unwrap()
    }

    #[test]
    fn log_path_uses_minute_timestamp_and_machine_name() {
        assert_eq!(
            log_file_path("/home/dev/build", "ubuntu", at()),
            "/home/dev/build/2024-03-07 09:05_ubuntu_output"
        );
    }

    #[test]
    fn log_path_ignores_trailing_separator() {
        assert_eq!(
            log_file_path("C:/build/", "win10", at()),
            "C:/build/2024-03-07 09:05_win10_output"
        );
    }

    #[test]
    fn fresh_state_has_no_transport() {
        let machine = MachineConfig {
            name: "m".into(),
            login: "dev".into(),
            secret: "pw".into(),
            repo_path: "/r".into(),
            make_path: "/r".into(),
            make_cmd: "make".into(),
            guest: false,
        };
        let mut state = MachineRuntimeState::new(&machine, at());
        assert!(state.transport_mut().is_err());
        assert!(!state.started_vm());
    }

    #[test]
    fn torn_down_state_refuses_transport_access() {
        let machine = MachineConfig {
            name: "m".into(),
            login: "dev".into(),
            secret: "pw".into(),
            repo_path: "/r".into(),
            make_path: "/r".into(),
            make_cmd: "make".into(),
            guest: false,
        };
        let mut state = MachineRuntimeState::new(&machine, at());
        state.mark_torn_down();
        let err = state.transport_mut().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("torn down"), "got {err:?}");
    }
}
