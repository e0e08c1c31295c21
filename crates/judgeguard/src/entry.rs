//! Entry redirect harness
//!
//! The build renames the submission's `main` and links a `main` that calls
//! [`run`] with it. The renamed entry point runs inside `catch_unwind`; its
//! return value becomes the exit code and any panic escaping it becomes a
//! verdict signal.
//!
//! ```ignore
//! #[path = "submission.rs"]
//! mod submission; // `fn main` renamed to `pub fn submission_main`
//!
//! judgeguard::redirect_main!(submission::submission_main);
//! ```
//!
//! Requires `panic = "unwind"`. With `panic = "abort"` nothing reaches the
//! boundary; use the [`hook`](crate::hook) harness instead.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::classify::classify;
use crate::config::Config;
use crate::harness::{self, HarnessKind};
use crate::signal::{exit_quietly, raise_and_halt, signal_for};

/// Conversion of an entry point's return value into an exit code
pub trait EntryReturn {
    fn into_exit_code(self) -> i32;
}

impl EntryReturn for () {
    fn into_exit_code(self) -> i32 {
        0
    }
}

impl EntryReturn for i32 {
    fn into_exit_code(self) -> i32 {
        self
    }
}

impl EntryReturn for u8 {
    fn into_exit_code(self) -> i32 {
        i32::from(self)
    }
}

impl<T: EntryReturn, E: Debug> EntryReturn for Result<T, E> {
    fn into_exit_code(self) -> i32 {
        match self {
            Ok(value) => value.into_exit_code(),
            Err(err) => {
                eprintln!("Error: {err:?}");
                1
            }
        }
    }
}

/// Run the renamed entry point under the harness, configured from the
/// environment. Never returns.
pub fn run<F, T>(entry: F) -> !
where
    F: FnOnce() -> T,
    T: EntryReturn,
{
    let config = harness::load_config();
    run_with(&config, entry)
}

/// Run the renamed entry point under the harness with an explicit config.
/// Never returns.
pub fn run_with<F, T>(config: &Config, entry: F) -> !
where
    F: FnOnce() -> T,
    T: EntryReturn,
{
    if let Err(err) = harness::claim(HarnessKind::EntryRedirect) {
        warn!(%err, "running without exclusive harness");
    }
    if let Err(err) = harness::prepare(config) {
        warn!(%err, "harness only partially prepared");
    }

    debug!("entering submission");
    match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok(value) => exit_quietly(value.into_exit_code()),
        Err(payload) => raise_and_halt(signal_for(classify(&*payload))),
    }
}

/// Define `fn main` as the entry redirect harness around a renamed entry
/// point
#[macro_export]
macro_rules! redirect_main {
    ($entry:path) => {
        fn main() {
            $crate::entry::run($entry)
        }
    };
}
