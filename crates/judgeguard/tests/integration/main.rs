//! Integration tests for judgeguard
//!
//! Each test runs the `judgeguard-scenario` fixture under one of the two
//! harnesses and decodes how the process terminated.

use std::process::{Command, Output};

use judgeguard::{Config, Outcome};

mod config_loading;
mod termination_hook;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

const SCENARIO_BIN: &str = env!("CARGO_BIN_EXE_judgeguard-scenario");

/// Harness the fixture installs
#[derive(Debug, Clone, Copy)]
pub(crate) enum Mode {
    Entry,
    Hook,
}

impl Mode {
    fn as_arg(self) -> &'static str {
        match self {
            Mode::Entry => "entry",
            Mode::Hook => "hook",
        }
    }
}

/// Build a command running `scenario` under `mode` with a clean harness
/// environment
pub(crate) fn scenario_command(mode: Mode, scenario: &str) -> Command {
    let mut command = Command::new(SCENARIO_BIN);
    command.arg(mode.as_arg()).arg(scenario);
    for (key, _) in std::env::vars() {
        if key.starts_with("JUDGEGUARD_") {
            command.env_remove(key);
        }
    }
    command
}

/// Run a prepared command and decode its termination with `config`'s signals
pub(crate) fn run_command(mut command: Command, config: &Config) -> (Outcome, Output) {
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("failed to run {SCENARIO_BIN}: {e}"));
    (Outcome::from_status(output.status, &config.signals), output)
}

/// Run `scenario` under `mode` with the default signals
pub(crate) fn run_scenario(mode: Mode, scenario: &str) -> (Outcome, Output) {
    run_command(scenario_command(mode, scenario), &Config::default())
}
