//! Failure classification
//!
//! The orchestrator only needs to tell "ran out of memory" apart from
//! "failed for any other reason", so a panic payload is mapped onto a
//! two-way [`FailureKind`].

use std::any::Any;
use std::collections::TryReserveError;
use std::fmt;
use std::io;

/// Message std prints when an infallible allocation fails:
/// `memory allocation of <size> bytes failed`.
const ALLOCATION_FAILED_PREFIX: &str = "memory allocation of ";
const ALLOCATION_FAILED_SUFFIX: &str = " bytes failed";

/// Tail of an unwrapped or expected `TryReserveError` whose allocator
/// refused the request.
const TRY_RESERVE_ALLOC_ERROR: &str = ": TryReserveError { kind: AllocError {";

/// Payload a submission (or a runtime shim) can raise with
/// [`std::panic::panic_any`] to report that it could not obtain memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutOfMemory;

impl fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("out of memory")
    }
}

impl std::error::Error for OutOfMemory {}

/// Kind of an uncaught failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The program could not obtain memory
    ResourceExhaustion,

    /// Any other failure, structured or not
    Other,
}

/// What the termination path should do with an optional pending failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Nothing is propagating; exit quietly with status 0
    Quiet,

    /// Raise the signal agreed for this kind of failure
    Raise(FailureKind),
}

/// Classify a panic payload
///
/// A `TryReserveError` only counts as resource exhaustion when the allocator
/// refused the request. A capacity overflow asks for more than the address
/// space can hold, which is a bug in the program rather than a memory limit.
pub fn classify(payload: &(dyn Any + Send)) -> FailureKind {
    if payload.is::<OutOfMemory>() {
        return FailureKind::ResourceExhaustion;
    }

    if let Some(err) = payload.downcast_ref::<TryReserveError>() {
        return if is_capacity_overflow(err) {
            FailureKind::Other
        } else {
            FailureKind::ResourceExhaustion
        };
    }

    if let Some(err) = payload.downcast_ref::<io::Error>() {
        return if err.kind() == io::ErrorKind::OutOfMemory {
            FailureKind::ResourceExhaustion
        } else {
            FailureKind::Other
        };
    }

    let message = payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str));

    match message {
        Some(msg) if is_allocation_failure_message(msg) => FailureKind::ResourceExhaustion,
        _ => FailureKind::Other,
    }
}

fn is_allocation_failure_message(msg: &str) -> bool {
    let msg = msg.trim_end();

    let size = msg
        .strip_prefix(ALLOCATION_FAILED_PREFIX)
        .and_then(|rest| rest.strip_suffix(ALLOCATION_FAILED_SUFFIX));
    if let Some(size) = size {
        return !size.is_empty() && size.bytes().all(|b| b.is_ascii_digit());
    }

    msg.contains(TRY_RESERVE_ALLOC_ERROR) && msg.ends_with('}')
}

/// `TryReserveErrorKind` is unstable, so the variant is read from the
/// `Debug` output without allocating.
fn is_capacity_overflow(err: &TryReserveError) -> bool {
    struct Scan {
        found: bool,
    }

    impl fmt::Write for Scan {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.found |= s.contains("CapacityOverflow");
            Ok(())
        }
    }

    let mut scan = Scan { found: false };
    let _ = fmt::write(&mut scan, format_args!("{err:?}"));
    scan.found
}

/// Decide how to terminate given what is currently propagating
pub fn decide(pending: Option<&(dyn Any + Send)>) -> Disposition {
    match pending {
        Some(payload) => Disposition::Raise(classify(payload)),
        None => Disposition::Quiet,
    }
}
