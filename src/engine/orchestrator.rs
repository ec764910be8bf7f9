// src/engine/orchestrator.rs

//! Per-machine build cycle.
//!
//! initialize -> record branch -> ensure target branch -> pull -> build ->
//! collect log -> restore branch -> delete created branch -> power down.
//!
//! The first failing step aborts the rest of the cycle, but teardown (closing
//! the session and powering down a VM this run started) always runs.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::build::{BuildRunner, LogCollector};
use crate::config::{MachineConfig, RunSettings};
use crate::engine::state::MachineRuntimeState;
use crate::errors::{BuildrigError, Result};
use crate::exec::{DefaultConnector, TransportConnector};
use crate::fs::{FileSystem, RealFileSystem};
use crate::git::GitWorkflow;
use crate::vm::{AddressPolling, VBoxManage, VmController, VmLifecycle};

/// What a successful machine run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineRunSummary {
    pub initial_branch: String,
    /// The target branch did not exist and was created (and later deleted).
    pub created_branch: bool,
    /// Where the build log ended up in the central log directory.
    pub collected_log: PathBuf,
}

pub struct Orchestrator {
    settings: RunSettings,
    vm_controller: Arc<dyn VmController>,
    connector: Arc<dyn TransportConnector>,
    fs: Arc<dyn FileSystem>,
}

impl Orchestrator {
    pub fn new(
        settings: RunSettings,
        vm_controller: Arc<dyn VmController>,
        connector: Arc<dyn TransportConnector>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            settings,
            vm_controller,
            connector,
            fs,
        }
    }

    /// Orchestrator wired to `VBoxManage`, the OpenSSH client and the real
    /// filesystem.
    pub fn production(settings: RunSettings) -> Self {
        let vm_controller = Arc::new(VBoxManage::new(&settings));
        let connector = Arc::new(DefaultConnector::new(settings.clone()));
        Self::new(settings, vm_controller, connector, Arc::new(RealFileSystem))
    }

    /// Run the full cycle for one machine on `branch`.
    pub async fn run_machine(
        &self,
        machine: &MachineConfig,
        branch: &str,
        started_at: NaiveDateTime,
    ) -> Result<MachineRunSummary> {
        info!(machine = %machine.name, %branch, guest = machine.guest, "starting machine run");
        let mut state = MachineRuntimeState::new(machine, started_at);

        let outcome = match self.initialize(machine, &mut state).await {
            Ok(()) => self.run_steps(machine, branch, &mut state).await,
            Err(e) => Err(e),
        };
        let teardown = self.teardown(machine, &mut state).await;

        match (outcome, teardown) {
            (Ok(summary), Ok(())) => {
                info!(machine = %machine.name, "machine run finished");
                Ok(summary)
            }
            (Ok(_), Err(e)) => {
                error!(machine = %machine.name, error = %e, "teardown failed");
                Err(e)
            }
            (Err(e), teardown) => {
                if let Err(t) = teardown {
                    warn!(machine = %machine.name, error = %t, "teardown after failure also failed");
                }
                error!(machine = %machine.name, error = %e, "machine run failed");
                Err(e)
            }
        }
    }

    /// Bring the machine online and open its transport.
    async fn initialize(&self, machine: &MachineConfig, state: &mut MachineRuntimeState) -> Result<()> {
        if machine.guest {
            let polling = AddressPolling::from_settings(&self.settings);
            let vm = state
                .vm
                .insert(VmLifecycle::new(Arc::clone(&self.vm_controller), &machine.name, polling));
            vm.power_up().await?;
            state.address = Some(vm.resolve_address().await?);
        }

        let transport = self.connector.connect(machine, state.address).await?;
        state.transport = Some(transport);
        debug!(machine = %machine.name, address = ?state.address, "transport ready");
        Ok(())
    }

    async fn run_steps(
        &self,
        machine: &MachineConfig,
        branch: &str,
        state: &mut MachineRuntimeState,
    ) -> Result<MachineRunSummary> {
        let log_path = state.log_path.clone();
        let shell = machine.shell();

        let (initial_branch, created_branch) = {
            let mut git = GitWorkflow::new(state.transport_mut()?, shell, &machine.repo_path, &machine.name);

            let initial_branch = git.get_active_branch().await?;
            info!(machine = %machine.name, %initial_branch, "recorded initial branch");

            let mut created_branch = false;
            if !git.switch_branch(branch).await? {
                info!(machine = %machine.name, %branch, "branch not available locally; creating it");
                git.create_branch(branch).await?;
                created_branch = true;
                if !git.switch_branch(branch).await? {
                    return Err(BuildrigError::BranchSwitchFailed(branch.to_string()));
                }
            }

            git.pull_changes(branch).await?;
            (initial_branch, created_branch)
        };

        BuildRunner::new(state.transport_mut()?, machine)
            .build(&log_path)
            .await?;

        let collected_log = LogCollector::new(state.transport_mut()?, self.fs.as_ref(), &machine.name)
            .collect(&log_path, &self.settings.log_dir)
            .await?;

        let mut git = GitWorkflow::new(state.transport_mut()?, shell, &machine.repo_path, &machine.name);
        if !git.switch_branch(&initial_branch).await? {
            return Err(BuildrigError::BranchSwitchFailed(initial_branch));
        }
        if created_branch {
            git.delete_branch(branch).await?;
        }

        Ok(MachineRunSummary {
            initial_branch,
            created_branch,
            collected_log,
        })
    }

    /// Close the transport and power down a VM this run started. Runs on
    /// every exit path; attempts both steps even if the first fails.
    async fn teardown(&self, machine: &MachineConfig, state: &mut MachineRuntimeState) -> Result<()> {
        let mut first_error = None;

        if let Some(mut transport) = state.transport.take() {
            if let Err(e) = transport.close().await {
                warn!(machine = %machine.name, error = %e, "failed to close transport");
                first_error.get_or_insert(e);
            }
        }

        if let Some(vm) = state.vm.as_mut() {
            if let Err(e) = vm.power_down().await {
                first_error.get_or_insert(e);
            }
        }

        state.mark_torn_down();
        first_error.map_or(Ok(()), Err)
    }
}
