//! Shutdown coordination.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use super::signals::{Signal, SignalSource};

/// Programmatic shutdown trigger.
///
/// Provides a broadcast channel that orchestrators (or any long-running
/// task) can subscribe to. Embedding applications and tests use it in place
/// of OS signals.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<Signal>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.send(Signal::Requested);
    }

    /// Request shutdown as if `signal` had been delivered by the OS.
    pub fn send(&self, signal: Signal) {
        // No subscribers is fine: nobody is left to stop.
        let _ = self.tx.send(signal);
    }

    /// Number of live listeners.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownListener {
    rx: broadcast::Receiver<Signal>,
}

impl SignalSource for ShutdownListener {
    async fn recv(&mut self) -> io::Result<Signal> {
        match self.rx.recv().await {
            Ok(signal) => Ok(signal),
            // Missed some triggers; any of them means stop.
            Err(broadcast::error::RecvError::Lagged(_)) => Ok(Signal::Requested),
            Err(broadcast::error::RecvError::Closed) => {
                Err(io::Error::other("shutdown trigger dropped"))
            }
        }
    }
}

/// Deadline-bound cancellation shared by the drain and the shutdown hook.
///
/// The orchestrator never interrupts a hook; long-running cleanup should
/// check [`is_expired`](Self::is_expired) or wrap its work with
/// [`run_until_deadline`](Self::run_until_deadline).
#[derive(Debug, Clone)]
pub struct ShutdownContext {
    signal: Signal,
    deadline: Instant,
}

impl ShutdownContext {
    /// Context expiring `grace` from now.
    pub fn new(signal: Signal, grace: Duration) -> Self {
        Self {
            signal,
            deadline: Instant::now() + grace,
        }
    }

    /// The signal that started the shutdown.
    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Completes when the deadline passes.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline).await
    }

    /// Run `fut` until it completes or the deadline passes, whichever is first.
    pub async fn run_until_deadline<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::time::timeout_at(self.deadline, fut).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_listener() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        assert_eq!(shutdown.receiver_count(), 1);

        shutdown.send(Signal::Terminate);
        assert_eq!(listener.recv().await.unwrap(), Signal::Terminate);
    }

    #[tokio::test]
    async fn trigger_before_wait_is_kept() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        shutdown.trigger();
        shutdown.trigger();

        assert_eq!(listener.recv().await.unwrap(), Signal::Requested);
    }

    #[tokio::test]
    async fn dropped_trigger_is_an_error() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.listener();
        drop(shutdown);

        assert!(listener.recv().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn context_expires_at_deadline() {
        let ctx = ShutdownContext::new(Signal::Requested, Duration::from_secs(10));
        assert!(!ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.remaining(), Duration::from_secs(6));

        ctx.expired().await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_deadline_cuts_off_slow_work() {
        let ctx = ShutdownContext::new(Signal::Requested, Duration::from_secs(1));

        assert_eq!(ctx.run_until_deadline(async { 7 }).await, Some(7));
        let slow = ctx
            .run_until_deadline(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(slow, None);
    }
}
