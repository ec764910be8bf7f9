// src/engine/mod.rs

//! Orchestration engine for buildrig.
//!
//! - [`state`] holds the per-run mutable state (session, VM ownership, log
//!   path).
//! - [`orchestrator`] sequences git, build and log collection for one
//!   machine and guarantees teardown.
//! - [`batch`] runs every configured machine in order and reports.

pub mod batch;
pub mod orchestrator;
pub mod state;

pub use batch::{BatchReport, MachineOutcome};
pub use orchestrator::{MachineRunSummary, Orchestrator};
pub use state::{log_file_path, MachineRuntimeState};
