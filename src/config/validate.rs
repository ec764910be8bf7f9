// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, MachineConfig, RawConfigFile, RawMachine, RunSettings};
use crate::errors::{BuildrigError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BuildrigError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let settings = RunSettings::from(raw.constants);
        let machines = raw.machine.into_iter().map(MachineConfig::from).collect();
        Ok(ConfigFile::new_unchecked(settings, machines))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_machines(cfg)?;
    validate_constants(cfg)?;
    for machine in &cfg.machine {
        validate_machine(machine)?;
    }
    ensure_unique_names(cfg)?;
    Ok(())
}

fn ensure_has_machines(cfg: &RawConfigFile) -> Result<()> {
    if cfg.machine.is_empty() {
        return Err(BuildrigError::ConfigError(
            "config must contain at least one entry in `machine`".to_string(),
        ));
    }
    Ok(())
}

fn validate_constants(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.constants;

    if c.log_path.trim().is_empty() {
        return Err(BuildrigError::ConfigError(
            "constants.logPath must not be empty".to_string(),
        ));
    }

    let limits = [
        ("connectTimeoutSecs", c.connect_timeout_secs),
        ("commandTimeoutSecs", c.command_timeout_secs),
        ("vmLaunchTimeoutSecs", c.vm_launch_timeout_secs),
        ("addressTimeoutSecs", c.address_timeout_secs),
        ("addressPollIntervalMillis", c.address_poll_interval_millis),
    ];
    for (key, value) in limits {
        if value == 0 {
            return Err(BuildrigError::ConfigError(format!(
                "constants.{key} must be >= 1 (got 0)"
            )));
        }
    }

    if c.vm_launch_type.trim().is_empty() {
        return Err(BuildrigError::ConfigError(
            "constants.vmLaunchType must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_machine(machine: &RawMachine) -> Result<()> {
    if machine.name.trim().is_empty() {
        return Err(BuildrigError::ConfigError(
            "every machine needs a non-empty `name`".to_string(),
        ));
    }

    let required = [
        ("login", &machine.login),
        ("repoPath", &machine.repo_path),
        ("makePath", &machine.make_path),
        ("makeCmd", &machine.make_cmd),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(BuildrigError::ConfigError(format!(
                "machine '{}' has an empty `{}`",
                machine.name, key
            )));
        }
    }
    Ok(())
}

fn ensure_unique_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for machine in &cfg.machine {
        if !seen.insert(machine.name.as_str()) {
            return Err(BuildrigError::ConfigError(format!(
                "machine name '{}' is used more than once",
                machine.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = serde_json::from_str(json)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse(
            r#"{
                "constants": {"logPath": "/logs"},
                "machine": [{
                    "name": "local", "login": "me", "password": "pw",
                    "repoPath": "/repo", "makePath": "/repo/build",
                    "makeCmd": "make", "guest": false
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.machines.len(), 1);
        assert_eq!(cfg.machines[0].secret, "pw");
        assert_eq!(cfg.settings.ssh_port, 22);
        assert_eq!(cfg.settings.vm_launch_type, "gui");
        assert_eq!(cfg.settings.command_timeout.as_secs(), 3600);
    }

    #[test]
    fn empty_machine_list_is_rejected() {
        let err = parse(r#"{"constants": {"logPath": "/logs"}, "machine": []}"#).unwrap_err();
        assert!(matches!(err, BuildrigError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = parse(
            r#"{
                "constants": {"logPath": "/logs", "addressTimeoutSecs": 0},
                "machine": [{
                    "name": "vm", "login": "me", "password": "pw",
                    "repoPath": "/repo", "makePath": "/repo",
                    "makeCmd": "make", "guest": true
                }]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildrigError::ConfigError(msg) if msg.contains("addressTimeoutSecs")));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let machine = r#"{
            "name": "dup", "login": "me", "password": "pw",
            "repoPath": "/repo", "makePath": "/repo", "makeCmd": "make"
        }"#;
        let json = format!(r#"{{"constants": {{"logPath": "/logs"}}, "machine": [{machine}, {machine}]}}"#);
        let err = parse(&json).unwrap_err();
        assert!(matches!(err, BuildrigError::ConfigError(msg) if msg.contains("dup")));
    }
}
