// src/errors.rs

//! Crate-wide error type, aliases and exit-code mapping.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildrigError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Didn't find active branch in `git branch` output")]
    NoActiveBranchFound,

    #[error("Failed to create new branch '{0}'")]
    BranchCreationFailed(String),

    #[error("Failed to switch to branch '{0}'")]
    BranchSwitchFailed(String),

    #[error("Failed to delete branch '{branch}': {stderr}")]
    BranchDeletionFailed { branch: String, stderr: String },

    #[error("Remote host identification has changed. Please update host key")]
    HostKeyChanged { stderr: String },

    #[error("Unsaved changes in branch. Please commit them first")]
    UncommittedLocalChanges { stderr: String },

    #[error("Failed pulling new changes from branch '{branch}' (exit status {status})")]
    GenericPullFailure {
        branch: String,
        status: i32,
        stderr: String,
    },

    #[error("Building application failed (exit status {status}): {stderr}")]
    BuildFailed { status: i32, stderr: String },

    #[error("Failed to collect log '{path}': {reason}")]
    LogCollectionFailed { path: String, reason: String },

    #[error("Connection to {target} failed: {reason}")]
    TransportConnectionError { target: String, reason: String },

    #[error("Command timed out after {secs}s: {command}")]
    CommandTimedOut { command: String, secs: u64 },

    #[error("Hypervisor operation failed for VM '{vm}': {reason}")]
    VmControlFailed { vm: String, reason: String },

    #[error("VM '{vm}' did not publish an IPv4 address within {secs}s")]
    AddressUnavailable { vm: String, secs: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildrigError {
    /// Process exit code reported when this error ends a machine's run.
    pub fn exit_code(&self) -> u8 {
        match self {
            BuildrigError::ConfigError(_) | BuildrigError::JsonError(_) => 2,
            BuildrigError::IoError(_) => 3,
            BuildrigError::NoActiveBranchFound => 10,
            BuildrigError::BranchCreationFailed(_) => 11,
            BuildrigError::BranchSwitchFailed(_) => 12,
            BuildrigError::BranchDeletionFailed { .. } => 13,
            BuildrigError::HostKeyChanged { .. } => 20,
            BuildrigError::UncommittedLocalChanges { .. } => 21,
            BuildrigError::GenericPullFailure { .. } => 22,
            BuildrigError::BuildFailed { .. } => 30,
            BuildrigError::LogCollectionFailed { .. } => 31,
            BuildrigError::TransportConnectionError { .. } => 40,
            BuildrigError::CommandTimedOut { .. } => 41,
            BuildrigError::VmControlFailed { .. } => 50,
            BuildrigError::AddressUnavailable { .. } => 51,
            BuildrigError::Other(_) => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildrigError>;
