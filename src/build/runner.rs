// src/build/runner.rs

use tracing::{error, info};

use crate::config::MachineConfig;
use crate::errors::{BuildrigError, Result};
use crate::exec::CommandTransport;

/// Runs the machine's configured build command.
pub struct BuildRunner<'a> {
    transport: &'a mut dyn CommandTransport,
    machine: &'a MachineConfig,
}

impl<'a> BuildRunner<'a> {
    pub fn new(transport: &'a mut dyn CommandTransport, machine: &'a MachineConfig) -> Self {
        Self { transport, machine }
    }

    /// Command line run for the build: `make_cmd` inside `make_path`, stdout
    /// appended to `log_path`.
    pub fn command_line(&self, log_path: &str) -> String {
        let shell = self.machine.shell();
        shell.in_dir(
            &self.machine.make_path,
            &shell.append_stdout(&self.machine.make_cmd, log_path),
        )
    }

    pub async fn build(&mut self, log_path: &str) -> Result<()> {
        info!(machine = %self.machine.name, cmd = %self.machine.make_cmd, "building application");
        let command_line = self.command_line(log_path);
        let result = self.transport.execute(&command_line).await?;

        if result.success() {
            info!(machine = %self.machine.name, log = %log_path, "build succeeded");
            Ok(())
        } else {
            error!(
                machine = %self.machine.name,
                exit_code = result.status,
                stderr = %result.stderr.trim(),
                "build failed"
            );
            Err(BuildrigError::BuildFailed {
                status: result.status,
                stderr: result.stderr,
            })
        }
    }
}
