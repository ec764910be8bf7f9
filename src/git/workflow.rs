// src/git/workflow.rs

//! Branch management and pulling, issued through a [`CommandTransport`]
//! inside the machine's repository.

use tracing::{debug, info, warn};

use crate::errors::{BuildrigError, Result};
use crate::exec::shell::ShellDialect;
use crate::exec::{CommandResult, CommandTransport};
use crate::git::parse::{classify_pull_failure, parse_active_branch, parse_branch_list, PullFailure};

pub struct GitWorkflow<'a> {
    transport: &'a mut dyn CommandTransport,
    shell: ShellDialect,
    repo_path: &'a str,
    machine: &'a str,
}

impl<'a> GitWorkflow<'a> {
    pub fn new(
        transport: &'a mut dyn CommandTransport,
        shell: ShellDialect,
        repo_path: &'a str,
        machine: &'a str,
    ) -> Self {
        Self {
            transport,
            shell,
            repo_path,
            machine,
        }
    }

    async fn git(&mut self, args: &str) -> Result<CommandResult> {
        let command_line = self.shell.in_dir(self.repo_path, &format!("git {args}"));
        debug!(machine = %self.machine, cmd = %command_line, "running git");
        self.transport.execute(&command_line).await
    }

    async fn list_branches(&mut self) -> Result<CommandResult> {
        self.git("branch").await
    }

    /// Branch currently checked out in the repository.
    pub async fn get_active_branch(&mut self) -> Result<String> {
        debug!(machine = %self.machine, "getting active branch");
        let listing = self.list_branches().await?;
        let branch = parse_active_branch(&listing.stdout).ok_or(BuildrigError::NoActiveBranchFound)?;
        debug!(machine = %self.machine, %branch, "active branch");
        Ok(branch)
    }

    /// Create `branch` and confirm it shows up in a fresh listing; the
    /// create command's own exit status is not trusted.
    pub async fn create_branch(&mut self, branch: &str) -> Result<()> {
        debug!(machine = %self.machine, %branch, "creating branch");
        let quoted = self.shell.quote(branch);
        let created = self.git(&format!("branch {quoted}")).await?;
        if !created.success() {
            debug!(machine = %self.machine, %branch, stderr = %created.stderr.trim(), "git branch reported failure");
        }

        let listing = self.list_branches().await?;
        if parse_branch_list(&listing.stdout).iter().any(|b| b == branch) {
            Ok(())
        } else {
            Err(BuildrigError::BranchCreationFailed(branch.to_string()))
        }
    }

    /// Check out `branch`. Returns whether git succeeded; a failed checkout
    /// is not an error.
    pub async fn switch_branch(&mut self, branch: &str) -> Result<bool> {
        debug!(machine = %self.machine, %branch, "switching branch");
        let quoted = self.shell.quote(branch);
        let result = self.git(&format!("checkout {quoted}")).await?;
        if !result.success() {
            debug!(machine = %self.machine, %branch, stderr = %result.stderr.trim(), "checkout failed");
        }
        Ok(result.success())
    }

    /// Force-delete `branch`.
    pub async fn delete_branch(&mut self, branch: &str) -> Result<()> {
        debug!(machine = %self.machine, %branch, "deleting branch");
        let quoted = self.shell.quote(branch);
        let result = self.git(&format!("branch -D {quoted}")).await?;
        if result.success() {
            Ok(())
        } else {
            Err(BuildrigError::BranchDeletionFailed {
                branch: branch.to_string(),
                stderr: result.stderr,
            })
        }
    }

    /// `git pull origin <branch>`, classifying failures from the error text.
    pub async fn pull_changes(&mut self, branch: &str) -> Result<()> {
        info!(machine = %self.machine, %branch, "pulling changes from branch");
        let quoted = self.shell.quote(branch);
        let result = self.git(&format!("pull origin {quoted}")).await?;
        if result.success() {
            return Ok(());
        }

        let failure = classify_pull_failure(&result.stderr);
        warn!(machine = %self.machine, %branch, ?failure, exit_code = result.status, "pull failed");
        Err(match failure {
            PullFailure::HostKeyChanged => BuildrigError::HostKeyChanged { stderr: result.stderr },
            PullFailure::UncommittedLocalChanges => BuildrigError::UncommittedLocalChanges { stderr: result.stderr },
            PullFailure::Generic => BuildrigError::GenericPullFailure {
                branch: branch.to_string(),
                status: result.status,
                stderr: result.stderr,
            },
        })
    }
}
