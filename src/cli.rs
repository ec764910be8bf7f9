// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::Parser;

/// Command-line arguments for `buildrig`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildrig",
    version,
    about = "Pull a branch, build it and collect the log on every configured machine.",
    long_about = None
)]
pub struct CliArgs {
    /// Remote branch from which changes will be pulled.
    pub branch: String,

    /// Set logging to debug.
    #[arg(short, long, visible_alias = "DEBUG")]
    pub debug: bool,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
