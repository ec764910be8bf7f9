// src/build/mod.rs

//! Build execution and log collection on a target machine.

pub mod collect;
pub mod runner;

pub use collect::LogCollector;
pub use runner::BuildRunner;
