// src/exec/ssh.rs

//! Remote transport over the OpenSSH client.
//!
//! `connect` authenticates once with login/secret (fed to `sshpass` through
//! the `SSHPASS` environment variable) and leaves a control master running
//! in the background. Every later `ssh`/`scp` invocation multiplexes over
//! that master's socket, so the secret is only ever needed once.
//!
//! Unknown host keys are accepted and stored (`StrictHostKeyChecking=accept-new`);
//! a *changed* key still makes the connection fail.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::RunSettings;
use crate::errors::{BuildrigError, Result};
use crate::exec::runner::{run_captured, run_detached};
use crate::exec::shell::ShellDialect;
use crate::exec::{CommandResult, CommandTransport, FetchedFile};
use crate::fs::destination_in;
use crate::types::BoxFuture;

/// Exit status `ssh` uses for its own (connection) failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshOptions {
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl SshOptions {
    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            port: settings.ssh_port,
            connect_timeout: settings.connect_timeout,
            command_timeout: settings.command_timeout,
        }
    }
}

/// An authenticated session to one guest.
#[derive(Debug)]
pub struct SshSession {
    target: String,
    options: SshOptions,
    control_path: PathBuf,
    closed: bool,
    // Holds the control socket; removed when the session is dropped.
    _control_dir: TempDir,
}

impl SshSession {
    /// Authenticate against `host` and start the control master.
    ///
    /// Every failure here is reported as
    /// [`BuildrigError::TransportConnectionError`].
    pub async fn connect(host: Ipv4Addr, login: &str, secret: &str, options: SshOptions) -> Result<Self> {
        let target = format!("{login}@{host}");
        let connection_error = |reason: String| BuildrigError::TransportConnectionError {
            target: target.clone(),
            reason,
        };

        let control_dir = tempfile::Builder::new()
            .prefix("buildrig-ssh-")
            .tempdir()
            .map_err(|e| connection_error(format!("creating control directory: {e}")))?;
        let control_path = control_dir.path().join("ctl");
        let master_log = control_dir.path().join("master.log");

        info!(target = %target, port = options.port, "opening ssh session");

        let mut cmd = Command::new("sshpass");
        cmd.arg("-e")
            .arg("ssh")
            .args(["-M", "-N", "-f"])
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", options.connect_timeout.as_secs()))
            .args(["-o", "ServerAliveInterval=30"])
            .arg("-E")
            .arg(&master_log)
            .arg("-p")
            .arg(options.port.to_string())
            .arg(&target)
            .env("SSHPASS", secret);

        // Allow the handshake its own timeout plus authentication time.
        let budget = options.connect_timeout * 2;
        let code = run_detached(cmd, budget, &format!("ssh master {target}"))
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        if code != 0 {
            let log = tokio::fs::read_to_string(&master_log).await.unwrap_or_default();
            return Err(connection_error(describe_master_failure(code, log.trim())));
        }

        debug!(target = %target, control = ?control_path, "ssh control master running");

        Ok(Self {
            target,
            options,
            control_path,
            closed: false,
            _control_dir: control_dir,
        })
    }

    fn control_arg(&self) -> String {
        format!("ControlPath={}", self.control_path.display())
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg(self.control_arg())
            .args(["-o", "ControlMaster=no", "-o", "BatchMode=yes"])
            .arg("-p")
            .arg(self.options.port.to_string());
        cmd
    }

}

/// Line prefixes `ssh` itself uses for transport-level failures.
const SSH_DIAGNOSTIC_PREFIXES: &[&str] = &[
    "ssh:",
    "mux_client",
    "Control socket",
    "ControlSocket",
    "Connection to ",
    "Connection closed by",
    "Connection reset by",
    "kex_exchange_identification",
    "Host key verification failed",
    "Permission denied (",
];

fn is_ssh_diagnostic(stderr: &str) -> bool {
    stderr
        .lines()
        .map(str::trim_start)
        .any(|line| SSH_DIAGNOSTIC_PREFIXES.iter().any(|p| line.starts_with(p)))
}

/// `ssh` exits 255 on its own failures, but so does any remote command that
/// returns 255. Only the former, recognised by ssh's diagnostics on stderr,
/// is a connection error.
fn remote_outcome(target: &str, result: CommandResult) -> Result<CommandResult> {
    if result.status == SSH_CONNECTION_FAILURE && is_ssh_diagnostic(&result.stderr) {
        return Err(BuildrigError::TransportConnectionError {
            target: target.to_string(),
            reason: result.stderr.trim().to_string(),
        });
    }
    Ok(result)
}

fn describe_master_failure(code: i32, log: &str) -> String {
    // sshpass reserves 1..=6 for its own failures.
    let hint = match code {
        3 => "sshpass runtime error",
        5 => "invalid login or password",
        6 => "host key unknown and could not be stored",
        SSH_CONNECTION_FAILURE => "ssh could not connect",
        _ => "ssh master exited",
    };
    if log.is_empty() {
        format!("{hint} (exit status {code})")
    } else {
        format!("{hint} (exit status {code}): {log}")
    }
}

impl CommandTransport for SshSession {
    fn execute<'a>(&'a mut self, command_line: &'a str) -> BoxFuture<'a, Result<CommandResult>> {
        Box::pin(async move {
            debug!(target = %self.target, cmd = %command_line, "running remote command");
            let mut cmd = self.ssh_command();
            cmd.arg(&self.target).arg("--").arg(command_line);

            let result = run_captured(cmd, self.options.command_timeout, command_line).await?;
            let result = remote_outcome(&self.target, result)?;
            debug!(target = %self.target, cmd = %command_line, exit_code = result.status, "remote command exited");
            Ok(result)
        })
    }

    fn fetch_file<'a>(&'a mut self, source: &'a str, dest_dir: &'a Path) -> BoxFuture<'a, Result<FetchedFile>> {
        Box::pin(async move {
            let dest = destination_in(dest_dir, source)?;

            // Legacy protocol (-O): the remote path is expanded by the guest
            // shell, so it is quoted for that shell.
            let remote = format!("{}:{}", self.target, ShellDialect::posix().quote(source));
            let mut cmd = Command::new("scp");
            cmd.arg("-O")
                .arg("-o")
                .arg(self.control_arg())
                .args(["-o", "ControlMaster=no", "-o", "BatchMode=yes"])
                .arg("-P")
                .arg(self.options.port.to_string())
                .arg(&remote)
                .arg(&dest);

            let result = run_captured(cmd, self.options.command_timeout, &format!("scp {remote}")).await?;
            if !result.success() {
                return Err(BuildrigError::Other(anyhow::anyhow!(
                    "scp exited with status {}: {}",
                    result.status,
                    result.stderr.trim()
                )));
            }
            debug!(from = %remote, to = ?dest, "copied remote file");
            Ok(FetchedFile::copied(dest))
        })
    }

    fn remove_file<'a>(&'a mut self, path: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let command_line = format!("rm -f {}", ShellDialect::posix().quote(path));
            let result = self.execute(&command_line).await?;
            if !result.success() {
                return Err(BuildrigError::Other(anyhow::anyhow!(
                    "removing {path} failed with status {}: {}",
                    result.status,
                    result.stderr.trim()
                )));
            }
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.closed {
                return Ok(());
            }
            self.closed = true;

            let mut cmd = self.ssh_command();
            cmd.args(["-O", "exit"]).arg(&self.target);
            let result = run_captured(cmd, self.options.connect_timeout, "ssh -O exit").await?;
            if result.success() {
                info!(target = %self.target, "ssh session closed");
            } else {
                warn!(target = %self.target, stderr = %result.stderr.trim(), "ssh master did not exit cleanly");
            }
            Ok(())
        })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Last resort for sessions that were never closed. The control socket
        // is deleted with `_control_dir` right after this, so the request has
        // to be sent now, but waiting on it is capped.
        let spawned = std::process::Command::new("ssh")
            .arg("-o")
            .arg(self.control_arg())
            .args(["-O", "exit"])
            .arg(&self.target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                if !wait_briefly(&mut child, DROP_EXIT_WAIT) {
                    warn!(target = %self.target, "ssh master did not confirm exit on drop");
                }
            }
            Err(e) => warn!(target = %self.target, error = %e, "failed to stop ssh master on drop"),
        }
    }
}

/// Upper bound on how long `Drop` blocks for `ssh -O exit`.
const DROP_EXIT_WAIT: Duration = Duration::from_millis(1500);

/// Poll `child` for up to `limit`; kill it if it is still running then.
/// Returns whether it exited on its own.
fn wait_briefly(child: &mut std::process::Child, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(20)),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        }
    }
}
