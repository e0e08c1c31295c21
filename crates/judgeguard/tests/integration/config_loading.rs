use judgeguard::config::{Config, ConfigError};
use nix::sys::signal::Signal;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{}/configs/valid_full.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.signals.resource_exhaustion.signal(), Signal::SIGXCPU);
    assert_eq!(config.signals.other_failure.signal(), Signal::SIGTERM);
    assert!(!config.stdio.desync);
    assert_eq!(config.stdio.buffer_size, 8192);
    assert!(!config.oom.trap_abort);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{}/configs/valid_minimal.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.signals.resource_exhaustion.signal(), Signal::SIGUSR1);
    assert_eq!(config.signals.other_failure.signal(), Signal::SIGSEGV);
    assert_eq!(config.stdio, Config::default().stdio);
}

#[test]
fn test_load_invalid_same_signal() {
    let path = format!("{}/configs/invalid_same_signal.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_unknown_signal() {
    let path = format!("{}/configs/invalid_unknown_signal.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_non_terminating_signal() {
    let path = format!("{}/configs/invalid_non_terminating.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
