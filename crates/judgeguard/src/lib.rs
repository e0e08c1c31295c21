//! A harness for judged submissions.
//!
//! judgeguard wraps an untrusted program so that an uncaught failure ends the
//! process with a signal the judging orchestrator can tell apart: one signal
//! when the program ran out of memory, another for any other failure. A
//! normal return still exits with the program's own exit code.
//!
//! # Features
//!
//! - **Entry redirect**: the submission's renamed `main` runs inside a catch-all boundary ([`entry`]).
//! - **Termination hook**: a process-wide panic hook for submissions that keep their own `main` ([`hook`]).
//! - **Allocation failure trap**: aborts caused by a failed allocation are reported as resource exhaustion ([`oom`]).
//! - **Desynchronized stdout**: block-buffered output for output-heavy programs ([`stdio`]).
//! - **Configurable signals**: TOML or `JUDGEGUARD_*` environment variables ([`config`]).

pub use classify::{Disposition, FailureKind, OutOfMemory, classify, decide};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, SignalConfig};
pub use harness::{HarnessError, HarnessKind};
pub use outcome::Outcome;
pub use signal::SignalName;

pub mod classify;
pub mod config;
pub mod entry;
pub mod harness;
pub mod hook;
pub mod oom;
pub mod outcome;
pub mod signal;
pub mod stdio;
