// src/exec/local.rs

//! Transport for the host running buildrig itself.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::errors::{BuildrigError, Result};
use crate::exec::runner::{run_captured, shell_command};
use crate::exec::{CommandResult, CommandTransport, FetchedFile};
use crate::fs::{destination_in, FileSystem};
use crate::types::BoxFuture;

/// Runs command lines through `sh -c` (`cmd /C` on Windows) and copies files
/// with the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    timeout: Duration,
    fs: Arc<dyn FileSystem>,
}

impl LocalTransport {
    pub fn new(timeout: Duration, fs: Arc<dyn FileSystem>) -> Self {
        Self { timeout, fs }
    }
}

impl CommandTransport for LocalTransport {
    fn execute<'a>(&'a mut self, command_line: &'a str) -> BoxFuture<'a, Result<CommandResult>> {
        Box::pin(async move {
            debug!(cmd = %command_line, "running local command");
            let result = run_captured(shell_command(command_line), self.timeout, command_line).await?;
            debug!(cmd = %command_line, exit_code = result.status, "local command exited");
            Ok(result)
        })
    }

    fn fetch_file<'a>(&'a mut self, source: &'a str, dest_dir: &'a Path) -> BoxFuture<'a, Result<FetchedFile>> {
        Box::pin(async move {
            let dest = destination_in(dest_dir, source)?;
            // Copying a file onto itself truncates it.
            if self.fs.same_file(Path::new(source), &dest) {
                debug!(path = ?dest, "file already in destination directory");
                return Ok(FetchedFile { path: dest, in_place: true });
            }
            let bytes = self.fs.copy(Path::new(source), &dest)?;
            debug!(from = %source, to = ?dest, bytes, "copied local file");
            Ok(FetchedFile::copied(dest))
        })
    }

    fn remove_file<'a>(&'a mut self, path: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.fs.remove_file(Path::new(path)).map_err(BuildrigError::from)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::fs::RealFileSystem;

    #[tokio::test]
    async fn fetch_and_remove_use_filesystem() {
        let fs = MockFileSystem::new();
        fs.add_file("/build/2024-05-01 09:30_host_output", "build ok");
        fs.create_dir_all(Path::new("/logs")).unwrap();

        let mut transport = LocalTransport::new(Duration::from_secs(5), Arc::new(fs.clone()));
        let fetched = transport
            .fetch_file("/build/2024-05-01 09:30_host_output", Path::new("/logs"))
            .await
            .unwrap();
        assert!(!fetched.in_place);
        assert_eq!(fs.read_to_string(&fetched.path).unwrap(), "build ok");

        transport.remove_file("/build/2024-05-01 09:30_host_output").await.unwrap();
        assert!(!fs.exists(Path::new("/build/2024-05-01 09:30_host_output")));
    }

    #[tokio::test]
    async fn fetching_into_own_directory_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("2024-05-01 09:30_host_output");
        std::fs::write(&log, "compiled 12 files\n").unwrap();
        let source = log.to_string_lossy().into_owned();

        let mut transport = LocalTransport::new(Duration::from_secs(5), Arc::new(RealFileSystem));
        let fetched = transport.fetch_file(&source, dir.path()).await.unwrap();

        assert!(fetched.in_place);
        assert_eq!(fetched.path, log);
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "compiled 12 files\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let mut transport = LocalTransport::new(Duration::from_secs(5), Arc::new(MockFileSystem::new()));
        let result = transport.execute("echo nope 1>&2; exit 2").await.unwrap();
        assert_eq!(result.status, 2);
        assert_eq!(result.stderr.trim(), "nope");
        assert!(!result.success());
    }
}
