//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM and SIGINT handlers
//! - Translate them into [`Signal`] values for the orchestrator
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed up front, so a signal delivered before the
//!   orchestrator starts waiting is not lost

use std::fmt;
use std::future::Future;
use std::io;

/// Why shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Programmatic request through [`Shutdown`](super::Shutdown).
    Requested,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Interrupt => f.write_str("SIGINT"),
            Signal::Terminate => f.write_str("SIGTERM"),
            Signal::Requested => f.write_str("requested"),
        }
    }
}

/// Delivers termination signals to the orchestrator.
pub trait SignalSource: Send + 'static {
    /// Wait for the next termination signal.
    fn recv(&mut self) -> impl Future<Output = io::Result<Signal>> + Send;
}

/// Process termination signals.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Install the handlers. Must be called inside a Tokio runtime.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }
}

impl SignalSource for OsSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> io::Result<Signal> {
        let received = tokio::select! {
            r = self.interrupt.recv() => r.map(|_| Signal::Interrupt),
            r = self.terminate.recv() => r.map(|_| Signal::Terminate),
        };
        received.ok_or_else(|| io::Error::other("signal stream closed"))
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> io::Result<Signal> {
        tokio::signal::ctrl_c().await?;
        Ok(Signal::Interrupt)
    }
}
