// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod git;
pub mod logging;
pub mod types;
pub mod vm;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate};
use crate::engine::{BatchReport, Orchestrator};
use crate::errors::Result;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the production orchestrator (VBoxManage, OpenSSH, local shell)
/// - the sequential batch over every configured machine
pub async fn run(args: CliArgs) -> Result<BatchReport> {
    info!("starting building and testing");

    let config_path = default_config_path();
    debug!(path = ?config_path, "loading config");
    let cfg = load_and_validate(&config_path)?;
    for machine in &cfg.machines {
        debug!(?machine, "configured machine");
    }

    let orchestrator = Orchestrator::production(cfg.settings.clone());
    let started_at = chrono::Local::now().naive_local();
    let report = orchestrator
        .run_batch(&cfg.machines, &args.branch, started_at)
        .await;

    report.log_summary();
    Ok(report)
}
