// src/git/mod.rs

//! Git branch workflow.
//!
//! - [`parse`] holds the output parsing and pull-failure classification.
//! - [`workflow`] issues the five git operations the build cycle needs.

pub mod parse;
pub mod workflow;

pub use parse::{classify_pull_failure, parse_active_branch, parse_branch_list, PullFailure};
pub use workflow::GitWorkflow;
