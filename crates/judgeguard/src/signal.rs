//! Raising the verdict signals
//!
//! Everything reachable from [`raise_and_halt`] is async-signal-safe: it only
//! touches atomics and calls `sigaction`, `sigprocmask`, `raise` and `_exit`.
//! This lets the allocation-failure trap reuse it from inside a signal
//! handler.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::libc;
use nix::sys::signal::{self, SigHandler, SigSet, Signal};
use serde::Deserialize;

use crate::classify::FailureKind;
use crate::config::{ConfigError, SignalConfig};

static RESOURCE_EXHAUSTION: AtomicI32 = AtomicI32::new(Signal::SIGUSR1 as i32);
static OTHER_FAILURE: AtomicI32 = AtomicI32::new(Signal::SIGUSR2 as i32);

/// Set by the first thread that starts terminating the process.
static TERMINATING: AtomicBool = AtomicBool::new(false);

/// A signal given by name in the configuration, e.g. `"SIGUSR1"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct SignalName(Signal);

impl SignalName {
    pub const fn new(signal: Signal) -> Self {
        Self(signal)
    }

    pub fn signal(self) -> Signal {
        self.0
    }

    /// Raw signal number as reported by `waitpid`
    pub fn number(self) -> i32 {
        self.0 as i32
    }
}

impl FromStr for SignalName {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        let upper = name.to_ascii_uppercase();
        let canonical = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{upper}")
        };
        Signal::from_str(&canonical)
            .map(Self)
            .map_err(|_| ConfigError::UnknownSignal(name.to_string()))
    }
}

impl TryFrom<String> for SignalName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Publish the configured signal pair for the termination paths
pub fn configure(signals: &SignalConfig) {
    RESOURCE_EXHAUSTION.store(signals.resource_exhaustion.number(), Ordering::SeqCst);
    OTHER_FAILURE.store(signals.other_failure.number(), Ordering::SeqCst);
}

/// Signal raised for a failure of the given kind
pub fn signal_for(kind: FailureKind) -> Signal {
    let (slot, fallback) = match kind {
        FailureKind::ResourceExhaustion => (&RESOURCE_EXHAUSTION, Signal::SIGUSR1),
        FailureKind::Other => (&OTHER_FAILURE, Signal::SIGUSR2),
    };
    Signal::try_from(slot.load(Ordering::SeqCst)).unwrap_or(fallback)
}

/// Terminate the process through `signal`. Never returns.
///
/// Only the first caller in the process raises anything; later callers wait
/// for the process to die.
pub fn raise_and_halt(signal: Signal) -> ! {
    claim_termination();

    // SAFETY: installing SIG_DFL runs no Rust code in signal context.
    let _ = unsafe { signal::signal(signal, SigHandler::SigDfl) };
    let mut mask = SigSet::empty();
    mask.add(signal);
    let _ = mask.thread_unblock();
    let _ = signal::raise(signal);

    // Still alive: the signal was not fatal after all.
    halt(128 + signal as i32)
}

/// Exit normally with `code` after flushing buffered output
///
/// Unlike [`raise_and_halt`] this is not async-signal-safe.
pub fn exit_quietly(code: i32) -> ! {
    claim_termination();
    crate::stdio::flush();
    std::process::exit(code)
}

fn claim_termination() {
    if TERMINATING.swap(true, Ordering::SeqCst) {
        loop {
            // SAFETY: pause has no preconditions.
            unsafe { libc::pause() };
        }
    }
}

fn halt(code: i32) -> ! {
    // SAFETY: _exit has no preconditions and does not return.
    unsafe { libc::_exit(code) }
}
