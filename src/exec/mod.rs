// src/exec/mod.rs

//! Command transport layer.
//!
//! Every git/build/log operation talks to a [`CommandTransport`] instead of
//! spawning processes itself. This makes it easy to swap in a fake transport
//! in tests while keeping the production variants here:
//!
//! - [`local`] runs command lines through the host shell.
//! - [`ssh`] runs them over an authenticated OpenSSH control-master session
//!   on a guest VM.
//! - [`runner`] owns the timed process execution both variants build on.
//! - [`shell`] builds command strings for the target's shell family.

pub mod local;
pub mod runner;
pub mod shell;
pub mod ssh;

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{MachineConfig, RunSettings};
use crate::errors::{BuildrigError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::BoxFuture;

pub use local::LocalTransport;
pub use ssh::{SshOptions, SshSession};

/// Output of one command line executed on a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub status: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A file copied off the target by [`CommandTransport::fetch_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub path: PathBuf,
    /// The source already was the destination. Nothing was copied, and
    /// removing the source would delete the only copy.
    pub in_place: bool,
}

impl FetchedFile {
    pub fn copied(path: PathBuf) -> Self {
        Self { path, in_place: false }
    }
}

/// Trait abstracting how command lines reach a target machine.
///
/// Production code uses [`LocalTransport`] or [`SshSession`]; tests can
/// provide their own implementation that returns scripted results.
pub trait CommandTransport: Send {
    /// Run `command_line` on the target and wait for it to finish.
    ///
    /// A nonzero exit status is *not* an error; failures to reach the target
    /// are reported as [`BuildrigError::TransportConnectionError`].
    fn execute<'a>(&'a mut self, command_line: &'a str) -> BoxFuture<'a, Result<CommandResult>>;

    /// Copy `source` (a path on the target) into the local directory
    /// `dest_dir`, keeping its file name.
    fn fetch_file<'a>(&'a mut self, source: &'a str, dest_dir: &'a Path) -> BoxFuture<'a, Result<FetchedFile>>;

    /// Delete `path` on the target.
    fn remove_file<'a>(&'a mut self, path: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Tear down the session. No call may follow.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Which transport variant a machine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Local,
    Remote,
}

impl TransportKind {
    /// Pure function of the guest flag; nothing is probed at runtime.
    pub fn for_machine(machine: &MachineConfig) -> Self {
        if machine.guest {
            TransportKind::Remote
        } else {
            TransportKind::Local
        }
    }
}

/// Opens a transport for a machine once it is reachable.
pub trait TransportConnector: Send + Sync {
    /// `address` is the guest's resolved IPv4 address (`None` in local mode).
    fn connect<'a>(
        &'a self,
        machine: &'a MachineConfig,
        address: Option<Ipv4Addr>,
    ) -> BoxFuture<'a, Result<Box<dyn CommandTransport>>>;
}

/// Production connector: `LocalTransport` for local machines, an ssh
/// control-master session for guests.
#[derive(Debug, Clone)]
pub struct DefaultConnector {
    settings: RunSettings,
    fs: Arc<dyn FileSystem>,
}

impl DefaultConnector {
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            fs: Arc::new(RealFileSystem),
        }
    }
}

impl TransportConnector for DefaultConnector {
    fn connect<'a>(
        &'a self,
        machine: &'a MachineConfig,
        address: Option<Ipv4Addr>,
    ) -> BoxFuture<'a, Result<Box<dyn CommandTransport>>> {
        Box::pin(async move {
            match TransportKind::for_machine(machine) {
                TransportKind::Local => {
                    debug!(machine = %machine.name, "using local transport");
                    let transport = LocalTransport::new(self.settings.command_timeout, Arc::clone(&self.fs));
                    Ok(Box::new(transport) as Box<dyn CommandTransport>)
                }
                TransportKind::Remote => {
                    let host = address.ok_or_else(|| BuildrigError::TransportConnectionError {
                        target: machine.name.clone(),
                        reason: "no network address resolved for guest".to_string(),
                    })?;
                    let options = SshOptions::from_settings(&self.settings);
                    let session = SshSession::connect(host, &machine.login, &machine.secret, options).await?;
                    Ok(Box::new(session) as Box<dyn CommandTransport>)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(guest: bool) -> MachineConfig {
        MachineConfig {
            name: "m".into(),
            login: "dev".into(),
            secret: "pw".into(),
            repo_path: "/repo".into(),
            make_path: "/repo".into(),
            make_cmd: "make".into(),
            guest,
        }
    }

    #[test]
    fn transport_kind_follows_guest_flag() {
        assert_eq!(TransportKind::for_machine(&machine(true)), TransportKind::Remote);
        assert_eq!(TransportKind::for_machine(&machine(false)), TransportKind::Local);
    }

    #[tokio::test]
    async fn guest_without_address_is_a_connection_error() {
        let connector = DefaultConnector::new(RunSettings::with_log_dir("/logs"));
        let err = connector.connect(&machine(true), None).await.err().unwrap();
        assert!(matches!(err, BuildrigError::TransportConnectionError { .. }));
    }
}
