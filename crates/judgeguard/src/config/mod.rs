use std::path::PathBuf;

use nix::sys::signal::Signal;
use serde::Deserialize;
use thiserror::Error;

use crate::signal::SignalName;

mod loader;

/// Example configuration embedded at compile time.
///
/// Matches [`Config::default`]. Library users can write it out as a starter
/// config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../judgeguard.example.toml");

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "JUDGEGUARD";

/// Separator between nested keys in environment variable names.
pub const ENV_SEPARATOR: &str = "__";

/// Default capacity of the desynchronized stdout buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Signals whose default action does not terminate the process.
const NON_TERMINATING: &[Signal] = &[
    Signal::SIGCHLD,
    Signal::SIGCONT,
    Signal::SIGSTOP,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGURG,
    Signal::SIGWINCH,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("unknown signal name '{0}'")]
    UnknownSignal(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for judgeguard
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Signals raised for each failure kind.
    #[serde(default)]
    pub signals: SignalConfig,

    /// Standard stream buffering.
    #[serde(default)]
    pub stdio: StdioConfig,

    /// Allocation failure reporting.
    #[serde(default)]
    pub oom: OomConfig,
}

/// The pair of signals agreed upon with the orchestrator.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct SignalConfig {
    /// Raised when the submission ran out of memory
    #[serde(default = "default_resource_exhaustion")]
    pub resource_exhaustion: SignalName,

    /// Raised for any other uncaught failure
    #[serde(default = "default_other_failure")]
    pub other_failure: SignalName,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            resource_exhaustion: default_resource_exhaustion(),
            other_failure: default_other_failure(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct StdioConfig {
    /// Replace line-buffered stdout with a block-buffered writer
    #[serde(default = "default_true")]
    pub desync: bool,

    /// Capacity of the stdout buffer in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            desync: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct OomConfig {
    /// Report aborts that follow a failed allocation as resource exhaustion.
    ///
    /// Only effective when [`GuardedAlloc`](crate::oom::GuardedAlloc) is the
    /// global allocator.
    #[serde(default = "default_true")]
    pub trap_abort: bool,
}

impl Default for OomConfig {
    fn default() -> Self {
        Self { trap_abort: true }
    }
}

impl Config {
    /// Create a new config with the default signal pair
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variables that reproduce this config in a child process
    pub fn to_env(&self) -> Vec<(String, String)> {
        let key = |section: &str, field: &str| {
            format!("{ENV_PREFIX}_{section}{ENV_SEPARATOR}{field}").to_uppercase()
        };
        vec![
            (
                key("signals", "resource_exhaustion"),
                self.signals.resource_exhaustion.to_string(),
            ),
            (
                key("signals", "other_failure"),
                self.signals.other_failure.to_string(),
            ),
            (key("stdio", "desync"), self.stdio.desync.to_string()),
            (key("stdio", "buffer_size"), self.stdio.buffer_size.to_string()),
            (key("oom", "trap_abort"), self.oom.trap_abort.to_string()),
        ]
    }

    /// Validate the configuration
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let exhaustion = self.signals.resource_exhaustion.signal();
        let other = self.signals.other_failure.signal();

        if exhaustion == other {
            return Err(ConfigError::Invalid(format!(
                "resource_exhaustion and other_failure both use {exhaustion}"
            )));
        }

        for signal in [exhaustion, other] {
            if NON_TERMINATING.contains(&signal) {
                return Err(ConfigError::Invalid(format!(
                    "{signal} does not terminate the process by default"
                )));
            }
            // The abort trap re-raises SIGABRT for aborts it does not own.
            if signal == Signal::SIGABRT {
                return Err(ConfigError::Invalid(
                    "SIGABRT is reserved for ordinary aborts".to_string(),
                ));
            }
        }

        if self.stdio.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "stdio buffer_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_resource_exhaustion() -> SignalName {
    SignalName::new(Signal::SIGUSR1)
}

fn default_other_failure() -> SignalName {
    SignalName::new(Signal::SIGUSR2)
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_true() -> bool {
    true
}
