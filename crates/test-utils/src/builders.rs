#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use buildrig::config::{MachineConfig, RunSettings};

/// Builder for `MachineConfig` to simplify test setup.
pub struct MachineConfigBuilder {
    machine: MachineConfig,
}

impl MachineConfigBuilder {
    /// Local-host machine with a repository at `/repo` and builds in
    /// `/repo/build`.
    pub fn local(name: &str) -> Self {
        Self {
            machine: MachineConfig {
                name: name.to_string(),
                login: "dev".to_string(),
                secret: "secret".to_string(),
                repo_path: "/repo".to_string(),
                make_path: "/repo/build".to_string(),
                make_cmd: "make all".to_string(),
                guest: false,
            },
        }
    }

    /// Same defaults as [`MachineConfigBuilder::local`], in guest mode.
    pub fn guest(name: &str) -> Self {
        Self::local(name).guest_mode(true)
    }

    pub fn guest_mode(mut self, guest: bool) -> Self {
        self.machine.guest = guest;
        self
    }

    pub fn repo_path(mut self, path: &str) -> Self {
        self.machine.repo_path = path.to_string();
        self
    }

    pub fn make_path(mut self, path: &str) -> Self {
        self.machine.make_path = path.to_string();
        self
    }

    pub fn make_cmd(mut self, cmd: &str) -> Self {
        self.machine.make_cmd = cmd.to_string();
        self
    }

    pub fn build(self) -> MachineConfig {
        self.machine
    }
}

/// Run settings with short timeouts and fast address polling.
pub fn fast_settings(log_dir: impl AsRef<Path>) -> RunSettings {
    let mut settings = RunSettings::with_log_dir(log_dir.as_ref());
    settings.connect_timeout = Duration::from_secs(2);
    settings.command_timeout = Duration::from_secs(5);
    settings.vm_launch_timeout = Duration::from_secs(2);
    settings.address_timeout = Duration::from_millis(200);
    settings.address_poll_interval = Duration::from_millis(10);
    settings
}

/// Minimal valid JSON config with the given machine entries.
pub fn config_json(log_path: &str, machines: &[&str]) -> String {
    format!(
        r#"{{"constants": {{"logPath": "{log_path}"}}, "machine": [{}]}}"#,
        machines.join(", ")
    )
}

/// JSON object for one machine entry.
pub fn machine_json(name: &str, guest: bool) -> String {
    format!(
        r#"{{"name": "{name}", "login": "dev", "password": "secret", "repoPath": "/repo", "makePath": "/repo/build", "makeCmd": "make all", "guest": {guest}}}"#
    )
}
