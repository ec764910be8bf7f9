// src/logging.rs

//! Stderr logging via `tracing-subscriber`.
//!
//! `--debug` always wins. Without it the level is read from `BUILDRIG_LOG`
//! (`error`, `warn`, `info`, `debug`, `trace`), and an unset or unknown value
//! means `info`.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::fmt;

/// Environment variable consulted when `--debug` is not given.
pub const LOG_ENV_VAR: &str = "BUILDRIG_LOG";

/// Install the global subscriber. Call once, before the first log line.
pub fn init_logging(debug: bool) -> Result<()> {
    let level = resolve_level(debug, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing tracing subscriber")
}

fn resolve_level(debug: bool, env_value: Option<&str>) -> Level {
    if debug {
        return Level::DEBUG;
    }
    env_value
        .and_then(|value| value.trim().to_ascii_lowercase().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_environment() {
        assert_eq!(resolve_level(true, Some("error")), Level::DEBUG);
    }

    #[test]
    fn environment_level_is_trimmed_and_case_insensitive() {
        assert_eq!(resolve_level(false, Some(" WARN ")), Level::WARN);
        assert_eq!(resolve_level(false, Some("trace")), Level::TRACE);
    }

    #[test]
    fn unknown_or_missing_level_means_info() {
        assert_eq!(resolve_level(false, Some("verbose")), Level::INFO);
        assert_eq!(resolve_level(false, None), Level::INFO);
    }
}
