//! Termination hook harness
//!
//! For submissions whose own `main` stays the real entry point. The first
//! statement of `main` calls [`install`], which replaces the process-wide
//! panic hook. From then on a panic on any thread that no enclosing
//! [`catch_local`] handles ends the process with the verdict signal, however
//! deep in the call stack it started.
//!
//! The hook runs when the panic starts, before any unwinding, so it cannot
//! see a bare `std::panic::catch_unwind` further up the stack. This is
//! stricter than ending the process only when no handler matches: a panic
//! the submission would have caught with `catch_unwind` still ends the
//! process with the other failure signal. Submissions that recover from
//! panics must do so through [`catch_local`].

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, PanicHookInfo, UnwindSafe};
use std::sync::OnceLock;

use tracing::debug;

use crate::classify::{Disposition, decide};
use crate::config::Config;
use crate::harness::{self, HarnessError, HarnessKind};
use crate::signal::{exit_quietly, raise_and_halt, signal_for};

static INSTALLED: OnceLock<()> = OnceLock::new();

thread_local! {
    /// Number of [`catch_local`] scopes the current thread is inside.
    static LOCAL_HANDLERS: Cell<usize> = const { Cell::new(0) };
}

/// Install the hook, configured from the environment
///
/// Returns `Ok(false)` if the hook was already installed.
pub fn install() -> Result<bool, HarnessError> {
    let config = Config::load()?;
    install_with(&config)
}

/// Install the hook with an explicit config
///
/// Runs at most once per process; later calls return `Ok(false)`. The hook
/// stays installed even if arming the allocation failure trap fails.
pub fn install_with(config: &Config) -> Result<bool, HarnessError> {
    if !harness::claim(HarnessKind::TerminationHook)? {
        return Ok(false);
    }

    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        previous(info);
        on_panic(info);
    }));
    let _ = INSTALLED.set(());
    debug!("termination hook installed");

    harness::prepare(config)?;
    Ok(true)
}

/// Whether the hook is installed in this process
pub fn is_installed() -> bool {
    INSTALLED.get().is_some()
}

/// End the process through the hook with nothing propagating
///
/// Flushes buffered output and exits with status 0.
pub fn terminate() -> ! {
    finish(None)
}

/// Run `f`, returning a panic inside it as `Err` instead of ending the
/// process
pub fn catch_local<F, R>(f: F) -> Result<R, Box<dyn Any + Send + 'static>>
where
    F: FnOnce() -> R + UnwindSafe,
{
    struct Scope;

    impl Drop for Scope {
        fn drop(&mut self) {
            LOCAL_HANDLERS.with(|depth| depth.set(depth.get() - 1));
        }
    }

    LOCAL_HANDLERS.with(|depth| depth.set(depth.get() + 1));
    let _scope = Scope;
    panic::catch_unwind(f)
}

fn on_panic(info: &PanicHookInfo<'_>) {
    if LOCAL_HANDLERS.with(Cell::get) > 0 {
        return;
    }
    finish(Some(info.payload()))
}

fn finish(pending: Option<&(dyn Any + Send)>) -> ! {
    match decide(pending) {
        Disposition::Quiet => exit_quietly(0),
        Disposition::Raise(kind) => raise_and_halt(signal_for(kind)),
    }
}
