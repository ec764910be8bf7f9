// src/config/model.rs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::shell::ShellDialect;

/// Top-level configuration as read from a JSON file.
///
/// ```json
/// {
///   "constants": { "logPath": "C:/build-logs" },
///   "machine": [
///     {
///       "name": "ubuntu-builder",
///       "login": "dev",
///       "password": "secret",
///       "repoPath": "/home/dev/project",
///       "makePath": "/home/dev/project/build",
///       "makeCmd": "make all",
///       "guest": true
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub constants: RawConstants,

    #[serde(default)]
    pub machine: Vec<RawMachine>,
}

/// `constants` object. Only `logPath` is required; the rest bound the
/// blocking calls and tune the hypervisor/ssh side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConstants {
    /// Central directory that collected build logs are copied into.
    pub log_path: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_vm_launch_timeout_secs")]
    pub vm_launch_timeout_secs: u64,

    #[serde(default = "default_address_timeout_secs")]
    pub address_timeout_secs: u64,

    #[serde(default = "default_address_poll_interval_millis")]
    pub address_poll_interval_millis: u64,

    /// Frontend passed to the hypervisor when launching a guest
    /// (`gui`, `headless`, ...).
    #[serde(default = "default_vm_launch_type")]
    pub vm_launch_type: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_command_timeout_secs() -> u64 {
    3600
}

fn default_vm_launch_timeout_secs() -> u64 {
    300
}

fn default_address_timeout_secs() -> u64 {
    300
}

fn default_address_poll_interval_millis() -> u64 {
    2000
}

fn default_vm_launch_type() -> String {
    "gui".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

/// One entry of the `machine` array.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMachine {
    pub name: String,
    pub login: String,
    pub password: String,
    pub repo_path: String,
    pub make_path: String,
    pub make_cmd: String,
    #[serde(default)]
    pub guest: bool,
}

impl fmt::Debug for RawMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMachine")
            .field("name", &self.name)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("repo_path", &self.repo_path)
            .field("make_path", &self.make_path)
            .field("make_cmd", &self.make_cmd)
            .field("guest", &self.guest)
            .finish()
    }
}

/// Validated configuration. Obtain one through
/// [`crate::config::load_and_validate`] or `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: RunSettings,
    pub machines: Vec<MachineConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(settings: RunSettings, machines: Vec<MachineConfig>) -> Self {
        Self { settings, machines }
    }
}

/// Batch-wide settings shared by every machine run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub log_dir: PathBuf,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub vm_launch_timeout: Duration,
    pub address_timeout: Duration,
    pub address_poll_interval: Duration,
    pub vm_launch_type: String,
    pub ssh_port: u16,
}

impl RunSettings {
    /// Settings with every optional constant at its default.
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            connect_timeout: Duration::from_secs(default_connect_timeout_secs()),
            command_timeout: Duration::from_secs(default_command_timeout_secs()),
            vm_launch_timeout: Duration::from_secs(default_vm_launch_timeout_secs()),
            address_timeout: Duration::from_secs(default_address_timeout_secs()),
            address_poll_interval: Duration::from_millis(default_address_poll_interval_millis()),
            vm_launch_type: default_vm_launch_type(),
            ssh_port: default_ssh_port(),
        }
    }
}

impl From<RawConstants> for RunSettings {
    fn from(raw: RawConstants) -> Self {
        Self {
            log_dir: PathBuf::from(raw.log_path),
            connect_timeout: Duration::from_secs(raw.connect_timeout_secs),
            command_timeout: Duration::from_secs(raw.command_timeout_secs),
            vm_launch_timeout: Duration::from_secs(raw.vm_launch_timeout_secs),
            address_timeout: Duration::from_secs(raw.address_timeout_secs),
            address_poll_interval: Duration::from_millis(raw.address_poll_interval_millis),
            vm_launch_type: raw.vm_launch_type,
            ssh_port: raw.ssh_port,
        }
    }
}

/// Immutable description of one target machine.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Display name; in guest mode also the hypervisor's VM name.
    pub name: String,
    pub login: String,
    pub secret: String,
    pub repo_path: String,
    /// Working directory of the build command; the build log is written here.
    pub make_path: String,
    pub make_cmd: String,
    /// `true`: hypervisor guest reached over ssh. `false`: the local host.
    pub guest: bool,
}

impl MachineConfig {
    /// Shell flavour used to build every command line for this machine.
    pub fn shell(&self) -> ShellDialect {
        ShellDialect::for_target(self.guest, cfg!(windows))
    }
}

impl From<RawMachine> for MachineConfig {
    fn from(raw: RawMachine) -> Self {
        Self {
            name: raw.name,
            login: raw.login,
            secret: raw.password,
            repo_path: raw.repo_path,
            make_path: raw.make_path,
            make_cmd: raw.make_cmd,
            guest: raw.guest,
        }
    }
}

impl fmt::Debug for MachineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineConfig")
            .field("name", &self.name)
            .field("login", &self.login)
            .field("secret", &"<redacted>")
            .field("repo_path", &self.repo_path)
            .field("make_path", &self.make_path)
            .field("make_cmd", &self.make_cmd)
            .field("guest", &self.guest)
            .finish()
    }
}
