//! Lifecycle error definitions.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Ways an orchestrated run can fail.
///
/// A signal-driven shutdown is not an error; it is the `Ok` path.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The listener could not be created. Nothing was started.
    #[error("failed to bind {address}: {source}")]
    BindFailure {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Signal handlers could not be installed or the signal source broke.
    #[error("signal handling failed: {0}")]
    Signal(#[source] io::Error),

    /// The serve loop stopped on its own.
    #[error("serve loop failed: {0}")]
    Serve(#[source] io::Error),

    /// In-flight requests did not finish within the shutdown budget.
    /// The shutdown hook still ran.
    #[error("graceful shutdown exceeded its {grace:?} deadline")]
    DrainTimeout { grace: Duration },
}

impl LifecycleError {
    /// Process exit code for this failure.
    ///
    /// `1` startup failure, `2` serve failure, `3` shutdown timeout.
    pub fn exit_code(&self) -> u8 {
        match self {
            LifecycleError::BindFailure { .. } | LifecycleError::Signal(_) => 1,
            LifecycleError::Serve(_) => 2,
            LifecycleError::DrainTimeout { .. } => 3,
        }
    }

    /// Whether the failure happened before the server accepted traffic.
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, LifecycleError::BindFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_outcomes() {
        let bind = LifecycleError::BindFailure {
            address: "0.0.0.0:80".into(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        let serve = LifecycleError::Serve(io::Error::other("boom"));
        let drain = LifecycleError::DrainTimeout {
            grace: Duration::from_secs(10),
        };

        assert_eq!(bind.exit_code(), 1);
        assert!(bind.is_startup_failure());
        assert_eq!(serve.exit_code(), 2);
        assert_eq!(drain.exit_code(), 3);
        assert_eq!(drain.to_string(), "graceful shutdown exceeded its 10s deadline");
    }
}
