// tests/config_loading.rs

mod common;
use crate::common::builders::{config_json, machine_json};

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;

use buildrig::config::load_and_validate;
use buildrig::errors::BuildrigError;
use buildrig::types::CommandSeparator;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn machines_keep_config_order_and_modes() {
    let file = write_config(&config_json(
        "/var/log/builds",
        &[&machine_json("ubuntu", true), &machine_json("host", false)],
    ));

    let cfg = load_and_validate(file.path()).unwrap();

    let names: Vec<_> = cfg.machines.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["ubuntu", "host"]);
    assert!(cfg.machines[0].guest);
    assert_eq!(cfg.machines[0].shell().separator, CommandSeparator::Semicolon);
    assert_eq!(cfg.settings.log_dir, Path::new("/var/log/builds"));
    assert_eq!(cfg.settings.address_poll_interval, Duration::from_millis(2000));
}

#[test]
fn constants_override_defaults() {
    let file = write_config(
        r#"{
            "constants": {
                "logPath": "/logs",
                "connectTimeoutSecs": 5,
                "commandTimeoutSecs": 60,
                "vmLaunchType": "headless",
                "sshPort": 2222
            },
            "machine": [{
                "name": "vm", "login": "dev", "password": "pw",
                "repoPath": "/r", "makePath": "/r", "makeCmd": "make", "guest": true
            }]
        }"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.settings.connect_timeout, Duration::from_secs(5));
    assert_eq!(cfg.settings.command_timeout, Duration::from_secs(60));
    assert_eq!(cfg.settings.vm_launch_type, "headless");
    assert_eq!(cfg.settings.ssh_port, 2222);
}

#[test]
fn missing_guest_flag_means_local() {
    let file = write_config(
        r#"{"constants": {"logPath": "/logs"}, "machine": [{
            "name": "host", "login": "dev", "password": "pw",
            "repoPath": "/r", "makePath": "/r", "makeCmd": "make"
        }]}"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert!(!cfg.machines[0].guest);
}

#[test]
fn malformed_json_is_a_json_error() {
    let file = write_config(r#"{"constants": {"logPath": "/logs"}, "machine": ["#);

    let err = load_and_validate(file.path()).unwrap_err();

    assert!(matches!(err, BuildrigError::JsonError(_)), "got {err:?}");
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn missing_log_path_is_rejected() {
    let file = write_config(&format!(r#"{{"constants": {{}}, "machine": [{}]}}"#, machine_json("vm", true)));

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, BuildrigError::JsonError(_)), "got {err:?}");
}

#[test]
fn empty_required_field_names_machine_and_key() {
    let file = write_config(
        r#"{"constants": {"logPath": "/logs"}, "machine": [{
            "name": "vm", "login": "dev", "password": "pw",
            "repoPath": "/r", "makePath": "/r", "makeCmd": "  "
        }]}"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();

    match err {
        BuildrigError::ConfigError(msg) => {
            assert!(msg.contains("vm"));
            assert!(msg.contains("makeCmd"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = load_and_validate(dir.path().join("config.json")).unwrap_err();

    assert!(matches!(err, BuildrigError::IoError(_)), "got {err:?}");
    assert_eq!(err.exit_code(), 3);
}
