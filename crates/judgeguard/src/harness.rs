//! Setup shared by both harnesses
//!
//! A process uses exactly one harness. The first one to run claims the
//! process; claiming the same kind again is a no-op and claiming the other
//! kind is an error.

use std::fmt;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError};
use crate::{oom, signal, stdio};

static ACTIVE: OnceLock<HarnessKind> = OnceLock::new();

/// Which harness owns the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessKind {
    /// `main` calls the renamed entry point inside a catch-all boundary
    EntryRedirect,

    /// The panic hook catches failures that escape every handler
    TerminationHook,
}

impl fmt::Display for HarnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarnessKind::EntryRedirect => f.write_str("entry redirect"),
            HarnessKind::TerminationHook => f.write_str("termination hook"),
        }
    }
}

/// Errors that occur while installing a harness
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to load harness config: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot install the {requested} harness: the {active} harness is already active")]
    Conflict {
        active: HarnessKind,
        requested: HarnessKind,
    },

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] nix::Error),
}

/// The harness claimed by this process, if any
pub fn active() -> Option<HarnessKind> {
    ACTIVE.get().copied()
}

/// Claim the process for `kind`
///
/// Returns `Ok(true)` for the first claim and `Ok(false)` when `kind`
/// already owns the process.
pub(crate) fn claim(kind: HarnessKind) -> Result<bool, HarnessError> {
    let mut claimed = false;
    let active = *ACTIVE.get_or_init(|| {
        claimed = true;
        kind
    });

    if active != kind {
        return Err(HarnessError::Conflict {
            active,
            requested: kind,
        });
    }
    Ok(claimed)
}

/// Apply `config` to the process: signals, stdio and allocation trap
pub(crate) fn prepare(config: &Config) -> Result<(), HarnessError> {
    signal::configure(&config.signals);

    stdio::configure(&config.stdio);

    if config.oom.trap_abort
        && let Err(err) = oom::arm()
    {
        warn!(%err, "allocation failure trap unavailable");
        return Err(err.into());
    }

    debug!(
        resource_exhaustion = %config.signals.resource_exhaustion,
        other_failure = %config.signals.other_failure,
        "harness prepared"
    );
    Ok(())
}

/// Load the config from the environment, falling back to the defaults
pub(crate) fn load_config() -> Config {
    Config::load().unwrap_or_else(|err| {
        warn!(%err, "invalid harness config, using defaults");
        Config::default()
    })
}
