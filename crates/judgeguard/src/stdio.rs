//! Desynchronized standard output
//!
//! std's stdout is line buffered, so an output-heavy submission pays for a
//! `write` syscall per line. [`desync`] installs a process-wide block
//! buffered writer instead. Reads from stdin never flush it.
//!
//! When desynchronization is disabled the harness calls [`keep_synced`]
//! first, and [`out`] then writes straight through to std's line-buffered
//! stdout.
//!
//! The buffer is flushed when the process exits normally. Output still
//! buffered when the process dies by signal is lost.

use std::io::{self, BufWriter, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, TryLockError};

use nix::libc;
use tracing::debug;

use crate::config::{DEFAULT_BUFFER_SIZE, StdioConfig};

static OUTPUT: OnceLock<Mutex<Output>> = OnceLock::new();

static DESYNCED: AtomicBool = AtomicBool::new(false);

/// The process-wide stdout writer returned by [`out`]
#[derive(Debug)]
pub struct Output {
    sink: Sink,
}

#[derive(Debug)]
enum Sink {
    Block(BufWriter<Stdout>),
    Direct(Stdout),
}

impl Output {
    fn block(capacity: usize) -> Self {
        Self {
            sink: Sink::Block(BufWriter::with_capacity(capacity, io::stdout())),
        }
    }

    fn direct() -> Self {
        Self {
            sink: Sink::Direct(io::stdout()),
        }
    }

    /// Whether writes are held in a block buffer
    pub fn is_block_buffered(&self) -> bool {
        matches!(self.sink, Sink::Block(_))
    }

    /// Capacity of the block buffer, `None` when writing straight through
    pub fn capacity(&self) -> Option<usize> {
        match &self.sink {
            Sink::Block(writer) => Some(writer.capacity()),
            Sink::Direct(_) => None,
        }
    }

    /// Bytes written but not yet handed to std's stdout
    pub fn buffered(&self) -> &[u8] {
        match &self.sink {
            Sink::Block(writer) => writer.buffer(),
            Sink::Direct(_) => &[],
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::Block(writer) => writer.write(buf),
            Sink::Direct(stdout) => stdout.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match &mut self.sink {
            Sink::Block(writer) => writer.write_all(buf),
            Sink::Direct(stdout) => stdout.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Block(writer) => writer.flush(),
            Sink::Direct(stdout) => stdout.flush(),
        }
    }
}

/// Apply the `[stdio]` section of the config
pub fn configure(config: &StdioConfig) -> bool {
    if config.desync {
        desync(config.buffer_size)
    } else {
        keep_synced()
    }
}

/// Switch stdout to a block buffer of `capacity` bytes
///
/// Only the first call has an effect; it returns `true`. Later calls, and
/// calls after [`out`] or [`keep_synced`] has been used, return `false`.
pub fn desync(capacity: usize) -> bool {
    install(|| Output::block(capacity)).1
}

/// Make [`out`] write straight through to std's stdout
///
/// Like [`desync`], only the first call that installs a writer has an
/// effect.
pub fn keep_synced() -> bool {
    install(Output::direct).1
}

/// Whether the block buffered writer is in place
pub fn is_desynced() -> bool {
    DESYNCED.load(Ordering::SeqCst)
}

/// Lock the process-wide stdout writer
///
/// Installs the block buffered writer with the default capacity if neither
/// [`desync`] nor [`keep_synced`] was called.
pub fn out() -> MutexGuard<'static, Output> {
    install(|| Output::block(DEFAULT_BUFFER_SIZE))
        .0
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Flush buffered output, best effort
///
/// Skips the flush rather than wait on a writer locked elsewhere, since the
/// holder may be the thread that is failing.
pub fn flush() {
    let Some(output) = OUTPUT.get() else {
        return;
    };
    let mut writer = match output.try_lock() {
        Ok(writer) => writer,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return,
    };
    let _ = writer.flush();
}

fn install(make: impl FnOnce() -> Output) -> (&'static Mutex<Output>, bool) {
    let mut installed = None;
    let output = OUTPUT.get_or_init(|| {
        let output = make();
        DESYNCED.store(output.is_block_buffered(), Ordering::SeqCst);
        installed = Some(output.capacity());
        Mutex::new(output)
    });

    if let Some(capacity) = installed {
        // SAFETY: flush_at_exit is a plain extern "C" fn that does not unwind.
        let registered = unsafe { libc::atexit(flush_at_exit) } == 0;
        debug!(?capacity, registered, "stdout writer installed");
    }

    (output, installed.is_some())
}

extern "C" fn flush_at_exit() {
    flush();
}
