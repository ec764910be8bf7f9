// src/config/mod.rs

//! Configuration loading and validation for buildrig.
//!
//! Responsibilities:
//! - Define the JSON-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate required fields and limits (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, MachineConfig, RawConfigFile, RawConstants, RawMachine, RunSettings};
