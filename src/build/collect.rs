// src/build/collect.rs

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{BuildrigError, Result};
use crate::exec::CommandTransport;
use crate::fs::FileSystem;

/// Moves a build log from the target into the central log directory.
pub struct LogCollector<'a> {
    transport: &'a mut dyn CommandTransport,
    fs: &'a dyn FileSystem,
    machine: &'a str,
}

impl<'a> LogCollector<'a> {
    pub fn new(transport: &'a mut dyn CommandTransport, fs: &'a dyn FileSystem, machine: &'a str) -> Self {
        Self { transport, fs, machine }
    }

    /// Copy `log_path` (on the target) into `out_dir` and remove the source.
    ///
    /// Copy failures become [`BuildrigError::LogCollectionFailed`]; a source
    /// that cannot be removed afterwards is only logged. A log that already
    /// sits in `out_dir` is left where it is.
    pub async fn collect(&mut self, log_path: &str, out_dir: &Path) -> Result<PathBuf> {
        debug!(machine = %self.machine, from = %log_path, to = ?out_dir, "copying log to log directory");
        let failed = |reason: String| BuildrigError::LogCollectionFailed {
            path: log_path.to_string(),
            reason,
        };

        self.fs
            .create_dir_all(out_dir)
            .map_err(|e| failed(format!("{e:#}")))?;

        let fetched = self
            .transport
            .fetch_file(log_path, out_dir)
            .await
            .map_err(|e| failed(e.to_string()))?;
        info!(machine = %self.machine, log = ?fetched.path, "build log collected");

        if fetched.in_place {
            debug!(machine = %self.machine, path = %log_path, "log written straight into the log directory; keeping it");
        } else if let Err(e) = self.transport.remove_file(log_path).await {
            warn!(machine = %self.machine, path = %log_path, error = %e, "could not clean up build log on target");
        }
        Ok(fetched.path)
    }
}
