//! Server lifecycle orchestration.
//!
//! # States
//! ```text
//! Starting → Running → Failed                  (serve loop exited)
//!                    → ShuttingDown → Stopped  (signal received)
//! ```
//!
//! # Design Decisions
//! - Bind happens before anything is spawned; bind errors return directly
//! - The serve loop runs on its own task; the orchestrator selects over its
//!   join handle and the signal source
//! - The join handle is kept after the signal so a serve error raised while
//!   draining is still reported
//! - On drain timeout the serve task is aborted and awaited, which closes the
//!   listener before the hook runs
//! - A failed drain is reported ahead of a broken signal source

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinError;

use crate::config::ServerConfig;
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::shutdown::ShutdownContext;
use crate::lifecycle::signals::{Signal, SignalSource};
use crate::observability::metrics;

/// Runs an HTTP server until a termination signal, then drains it.
pub struct Orchestrator<S> {
    config: ServerConfig,
    signals: S,
}

impl<S: SignalSource> Orchestrator<S> {
    pub fn new(config: ServerConfig, signals: S) -> Self {
        Self { config, signals }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener on the configured address.
    pub async fn bind(self) -> Result<BoundServer<S>, LifecycleError> {
        let address = self.config.bind_address();
        let bind_failure = |source| LifecycleError::BindFailure {
            address: address.clone(),
            source,
        };

        let listener = TcpListener::bind(&address).await.map_err(bind_failure)?;
        let local_addr = listener.local_addr().map_err(bind_failure)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(BoundServer {
            listener,
            local_addr,
            signals: self.signals,
            grace: self.config.shutdown_grace(),
        })
    }

    /// Bind, serve `app` and shut down gracefully; see [`BoundServer::serve`].
    pub async fn run<F, Fut>(self, app: Router, hook: F) -> Result<Signal, LifecycleError>
    where
        F: FnOnce(ShutdownContext) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        self.bind().await?.serve(app, hook).await
    }
}

/// A server whose listener is bound but not yet accepting.
pub struct BoundServer<S> {
    listener: TcpListener,
    local_addr: SocketAddr,
    signals: S,
    grace: Duration,
}

impl<S: SignalSource> BoundServer<S> {
    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve `app` until a termination signal arrives or the serve loop fails.
    ///
    /// On a signal, new connections stop being accepted and in-flight
    /// requests get until the shutdown deadline to finish. `hook` then runs
    /// exactly once with the shutdown context, even if the drain timed out.
    /// If the serve loop fails first, the error is returned and `hook` never
    /// runs.
    ///
    /// Returns the signal that stopped the server.
    pub async fn serve<F, Fut>(self, app: Router, hook: F) -> Result<Signal, LifecycleError>
    where
        F: FnOnce(ShutdownContext) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        self.serve_with(
            move |listener, drain| async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = drain.await;
                    })
                    .await
            },
            hook,
        )
        .await
    }

    /// [`serve`](Self::serve) with an arbitrary serve loop.
    ///
    /// `serve_loop` owns the listener and must stop accepting once `drain`
    /// resolves, then return after in-flight work has finished.
    pub(crate) async fn serve_with<L, LFut, F, Fut>(
        self,
        serve_loop: L,
        hook: F,
    ) -> Result<Signal, LifecycleError>
    where
        L: FnOnce(TcpListener, oneshot::Receiver<()>) -> LFut + Send,
        LFut: Future<Output = io::Result<()>> + Send + 'static,
        F: FnOnce(ShutdownContext) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let BoundServer {
            listener,
            local_addr,
            mut signals,
            grace,
        } = self;

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let mut serve_task = tokio::spawn(serve_loop(listener, drain_rx));

        tracing::info!(address = %local_addr, "Server running");

        let received = tokio::select! {
            joined = &mut serve_task => {
                let err = serve_exit_error(joined);
                tracing::error!(error = %err, "Serve loop stopped before shutdown was requested");
                metrics::record_shutdown("failed");
                return Err(LifecycleError::Serve(err));
            }
            received = signals.recv() => received,
        };

        let (signal, signal_error) = match received {
            Ok(signal) => (signal, None),
            Err(e) => {
                tracing::error!(error = %e, "Signal source failed, shutting down");
                (Signal::Requested, Some(e))
            }
        };

        tracing::info!(%signal, grace = ?grace, "Shutdown signal received, draining connections");
        let ctx = ShutdownContext::new(signal, grace);
        let _ = drain_tx.send(());

        let drained = match ctx.run_until_deadline(&mut serve_task).await {
            Some(Ok(Ok(()))) => Ok(()),
            Some(joined) => Err(LifecycleError::Serve(serve_exit_error(joined))),
            None => {
                tracing::warn!(grace = ?grace, "Drain deadline exceeded, closing listener");
                serve_task.abort();
                let _ = serve_task.await;
                Err(LifecycleError::DrainTimeout { grace })
            }
        };

        tracing::info!("Running shutdown hook");
        hook(ctx).await;

        // A failed drain outranks a broken signal source; the latter was
        // already logged.
        let outcome = match (drained, signal_error) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(e)) => Err(LifecycleError::Signal(e)),
            (Ok(()), None) => Ok(signal),
        };

        match &outcome {
            Ok(_) => {
                metrics::record_shutdown("stopped");
                tracing::info!("Server stopped");
            }
            Err(LifecycleError::DrainTimeout { .. }) => {
                metrics::record_shutdown("drain_timeout");
                tracing::error!("Server stopped after drain timeout");
            }
            Err(e) => {
                metrics::record_shutdown("failed");
                tracing::error!(error = %e, "Server stopped with error");
            }
        }
        outcome
    }
}

fn serve_exit_error(joined: Result<io::Result<()>, JoinError>) -> io::Error {
    match joined {
        Ok(Ok(())) => io::Error::other("serve loop exited without a shutdown request"),
        Ok(Err(e)) => e,
        Err(e) => io::Error::other(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::lifecycle::Shutdown;

    fn loopback(grace: Duration) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            shutdown_grace_ms: grace.as_millis() as u64,
            ..Default::default()
        }
    }

    fn counting_hook(calls: &Arc<AtomicUsize>) -> impl FnOnce(ShutdownContext) -> std::future::Ready<()> + Send {
        let calls = Arc::clone(calls);
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[test]
    fn serve_exit_error_mapping() {
        let clean = serve_exit_error(Ok(Ok(())));
        assert_eq!(clean.kind(), io::ErrorKind::Other);

        let failed = serve_exit_error(Ok(Err(io::Error::from(io::ErrorKind::ConnectionReset))));
        assert_eq!(failed.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn bind_resolves_ephemeral_port() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        };
        let shutdown = crate::lifecycle::Shutdown::new();
        let bound = Orchestrator::new(config, shutdown.listener()).bind().await.unwrap();

        assert_ne!(bound.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn serve_loop_failure_skips_hook() {
        let shutdown = Shutdown::new();
        let bound = Orchestrator::new(loopback(Duration::from_secs(5)), shutdown.listener())
            .bind()
            .await
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = bound
            .serve_with(
                |_listener, _drain| async { Err(io::Error::other("accept loop crashed")) },
                counting_hook(&calls),
            )
            .await;

        match result {
            Err(err @ LifecycleError::Serve(_)) => {
                assert_eq!(err.exit_code(), 2);
                assert!(err.to_string().contains("accept loop crashed"));
            }
            other => panic!("expected serve failure, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(shutdown);
    }

    #[tokio::test]
    async fn serve_loop_exiting_cleanly_counts_as_failure() {
        let shutdown = Shutdown::new();
        let bound = Orchestrator::new(loopback(Duration::from_secs(5)), shutdown.listener())
            .bind()
            .await
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = bound
            .serve_with(|_listener, _drain| async { Ok(()) }, counting_hook(&calls))
            .await;

        assert!(matches!(result, Err(LifecycleError::Serve(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(shutdown);
    }

    #[tokio::test]
    async fn drain_timeout_outranks_broken_signal_source() {
        let shutdown = Shutdown::new();
        let signals = shutdown.listener();
        drop(shutdown);

        let bound = Orchestrator::new(loopback(Duration::from_millis(50)), signals)
            .bind()
            .await
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        // Never finishes draining.
        let result = bound
            .serve_with(
                |_listener, _drain| std::future::pending::<io::Result<()>>(),
                counting_hook(&calls),
            )
            .await;

        match result {
            Err(err @ LifecycleError::DrainTimeout { .. }) => assert_eq!(err.exit_code(), 3),
            other => panic!("expected drain timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
