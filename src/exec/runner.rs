// src/exec/runner.rs

//! Timed process execution shared by every component that shells out
//! (local transport, ssh/scp client, hypervisor CLI).

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{BuildrigError, Result};
use crate::exec::CommandResult;

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// The child is killed if it has not exited after `timeout`; that case is
/// reported as [`BuildrigError::CommandTimedOut`] with `label` as the
/// command description.
pub async fn run_captured(mut cmd: Command, timeout: Duration, label: &str) -> Result<CommandResult> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();

    // Drain both pipes while waiting, otherwise a chatty child blocks on a
    // full pipe and wait() never resolves.
    tokio::select! {
        result = async {
            let (status, stdout, stderr) = tokio::join!(
                child.wait(),
                read_all(stdout_handle.as_mut()),
                read_all(stderr_handle.as_mut()),
            );
            let status = status?;
            Ok::<_, BuildrigError>(CommandResult {
                stdout,
                stderr,
                status: status.code().unwrap_or(-1),
            })
        } => result,
        () = tokio::time::sleep(timeout) => {
            if let Err(e) = child.kill().await {
                warn!(cmd = %label, error = %e, "failed to kill timed out process");
            }
            Err(BuildrigError::CommandTimedOut {
                command: label.to_string(),
                secs: timeout.as_secs(),
            })
        }
    }
}

/// Run `cmd` with all stdio detached and return only its exit code.
///
/// Used for processes that fork a long-lived background child holding on
/// to inherited descriptors (the ssh control master).
pub async fn run_detached(mut cmd: Command, timeout: Duration, label: &str) -> Result<i32> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let code = status?.code().unwrap_or(-1);
            debug!(cmd = %label, exit_code = code, "detached process exited");
            Ok(code)
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(cmd = %label, error = %e, "failed to kill timed out process");
            }
            Err(BuildrigError::CommandTimedOut {
                command: label.to_string(),
                secs: timeout.as_secs(),
            })
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(handle: Option<&mut R>) -> String {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Platform shell invocation for a full command line.
pub fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_streams_and_status() {
        let result = run_captured(
            shell_command("echo out; echo err 1>&2; exit 3"),
            Duration::from_secs(10),
            "test",
        )
        .await
        .unwrap();

        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.status, 3);
    }

    #[tokio::test]
    async fn kills_on_timeout() {
        let err = run_captured(shell_command("sleep 5"), Duration::from_millis(100), "sleep 5")
            .await
            .unwrap_err();
        assert!(matches!(err, BuildrigError::CommandTimedOut { ref command, .. } if command == "sleep 5"));
    }

    #[tokio::test]
    async fn detached_reports_exit_code() {
        let code = run_detached(shell_command("exit 4"), Duration::from_secs(10), "exit 4")
            .await
            .unwrap();
        assert_eq!(code, 4);
    }
}
