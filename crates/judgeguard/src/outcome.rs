//! Decoding how a wrapped program terminated
//!
//! Reads an exit status the way the orchestrator does: a normal exit code,
//! one of the two configured verdict signals, or some other signal such as a
//! SIGKILL sent for exceeding a time limit.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

use crate::config::SignalConfig;

/// Termination of a wrapped program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exited normally with this code
    Exited(i32),

    /// Killed by the resource exhaustion signal
    ResourceExhaustion,

    /// Killed by the other failure signal
    OtherFailure,

    /// Killed by a signal outside the harness contract
    Signaled(i32),

    /// Neither an exit code nor a signal was reported
    Unknown,
}

impl Outcome {
    /// Decode an exit status
    pub fn from_status(status: ExitStatus, signals: &SignalConfig) -> Self {
        Self::from_parts(status.code(), status.signal(), signals)
    }

    /// Decode an exit code and terminating signal as reported by `waitpid`
    pub fn from_parts(code: Option<i32>, signal: Option<i32>, signals: &SignalConfig) -> Self {
        match (code, signal) {
            (Some(code), _) => Outcome::Exited(code),
            (None, Some(signo)) if signo == signals.resource_exhaustion.number() => {
                Outcome::ResourceExhaustion
            }
            (None, Some(signo)) if signo == signals.other_failure.number() => {
                Outcome::OtherFailure
            }
            (None, Some(signo)) => Outcome::Signaled(signo),
            (None, None) => Outcome::Unknown,
        }
    }

    /// Whether the program exited normally with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Exited(0))
    }

    /// Whether the harness reported a failure of the submission
    #[must_use]
    pub fn is_harness_failure(&self) -> bool {
        matches!(self, Outcome::ResourceExhaustion | Outcome::OtherFailure)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exited with code {code}"),
            Outcome::ResourceExhaustion => f.write_str("resource exhaustion"),
            Outcome::OtherFailure => f.write_str("uncaught failure"),
            Outcome::Signaled(signo) => match Signal::try_from(*signo) {
                Ok(signal) => write!(f, "killed by {signal}"),
                Err(_) => write!(f, "killed by signal {signo}"),
            },
            Outcome::Unknown => f.write_str("unknown termination"),
        }
    }
}
