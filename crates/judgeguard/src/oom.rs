//! Allocation failure trap
//!
//! An infallible allocation that fails does not unwind: std reports it and
//! aborts. [`GuardedAlloc`] remembers the size of a failed allocation, and
//! the SIGABRT handler installed by [`arm`] turns an abort that
//! follows such a failure into the resource exhaustion signal.
//!
//! The failure is cleared by a later successful allocation at least as large
//! as the one that failed, or explicitly with [`clear`]. Smaller allocations
//! leave it set: std allocates on its own abort path (to capture a backtrace
//! when `RUST_BACKTRACE` is set), and those must not hide the failure. A
//! program that recovers from a failed `try_reserve` calls [`clear`] so that
//! a later unrelated abort still dies by SIGABRT.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::debug;

use crate::classify::FailureKind;
use crate::signal::{raise_and_halt, signal_for};

/// Size of the outstanding failed allocation, 0 when there is none.
static FAILED_SIZE: AtomicUsize = AtomicUsize::new(0);

#[cfg(feature = "global-allocator")]
#[global_allocator]
static GLOBAL: GuardedAlloc = GuardedAlloc::new(System);

/// Allocator wrapper that records allocation failures
#[derive(Debug, Default)]
pub struct GuardedAlloc<A = System> {
    inner: A,
}

impl<A> GuardedAlloc<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[inline]
fn record(ptr: *mut u8, size: usize) -> *mut u8 {
    if ptr.is_null() {
        // Layouts passed to a global allocator are never zero-sized.
        FAILED_SIZE.store(size.max(1), Ordering::SeqCst);
    } else {
        let failed = FAILED_SIZE.load(Ordering::Relaxed);
        if failed != 0 && size >= failed {
            let _ =
                FAILED_SIZE.compare_exchange(failed, 0, Ordering::SeqCst, Ordering::Relaxed);
        }
    }
    ptr
}

// SAFETY: every call is forwarded unchanged to `inner`; only the result is
// inspected.
unsafe impl<A: GlobalAlloc> GlobalAlloc for GuardedAlloc<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record(unsafe { self.inner.alloc(layout) }, layout.size())
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record(unsafe { self.inner.alloc_zeroed(layout) }, layout.size())
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        record(unsafe { self.inner.realloc(ptr, layout, new_size) }, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.inner.dealloc(ptr, layout) }
    }
}

/// Whether an allocation through [`GuardedAlloc`] failed and has not been
/// cleared since
pub fn allocation_failed() -> bool {
    FAILED_SIZE.load(Ordering::SeqCst) != 0
}

/// Forget a failed allocation the program has recovered from
pub fn clear() {
    FAILED_SIZE.store(0, Ordering::SeqCst);
}

/// Install the SIGABRT handler that reports allocation failures
pub fn arm() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_abort),
        SaFlags::empty(),
        SigSet::empty(),
    );

    // SAFETY: on_abort only performs async-signal-safe operations.
    unsafe { signal::sigaction(Signal::SIGABRT, &action) }?;

    debug!("allocation failure trap armed");
    Ok(())
}

extern "C" fn on_abort(_: libc::c_int) {
    if allocation_failed() {
        raise_and_halt(signal_for(FailureKind::ResourceExhaustion));
    }

    // Not ours: die the way the abort intended. SIGABRT is blocked while this
    // handler runs, so the raise is delivered once it returns.
    // SAFETY: restoring SIG_DFL runs no Rust code.
    let _ = unsafe { signal::signal(Signal::SIGABRT, SigHandler::SigDfl) };
    let _ = signal::raise(Signal::SIGABRT);
}
