// src/engine/batch.rs

//! Sequential processing of every configured machine.

use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::config::MachineConfig;
use crate::engine::orchestrator::{MachineRunSummary, Orchestrator};
use crate::errors::Result;

/// Result of one machine's run inside a batch.
#[derive(Debug)]
pub struct MachineOutcome {
    pub machine: String,
    pub result: Result<MachineRunSummary>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<MachineOutcome>,
}

impl BatchReport {
    /// True only if every machine's run succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &MachineOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// `0` on success, otherwise the exit code of the first failing machine.
    pub fn exit_code(&self) -> u8 {
        self.outcomes
            .iter()
            .find_map(|o| o.result.as_ref().err())
            .map_or(0, |e| e.exit_code())
    }

    /// Emit one line per machine followed by the overall verdict.
    pub fn log_summary(&self) {
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(summary) => info!(
                    machine = %outcome.machine,
                    log = ?summary.collected_log,
                    created_branch = summary.created_branch,
                    "machine succeeded"
                ),
                Err(e) => error!(machine = %outcome.machine, error = %e, "machine failed"),
            }
        }

        if self.is_success() {
            info!("Success");
        } else {
            info!(failed = self.failures().count(), total = self.outcomes.len(), "Failed");
        }
    }
}

impl Orchestrator {
    /// Run `branch` on every machine, one at a time in config order. A
    /// failing machine does not stop the others.
    pub async fn run_batch(&self, machines: &[MachineConfig], branch: &str, started_at: NaiveDateTime) -> BatchReport {
        let mut report = BatchReport::default();
        for machine in machines {
            let result = self.run_machine(machine, branch, started_at).await;
            report.outcomes.push(MachineOutcome {
                machine: machine.name.clone(),
                result,
            });
        }
        report
    }
}
