//! Service runtime binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file + PORT ──▶ RuntimeConfig
//!                              │
//!   Environment (env vars, ────┼──▶ ServiceIdentity ──┐
//!   metadata server)           │                      │
//!                              ▼                      ▼
//!                        Orchestrator ──serves──▶ Axum router ──reads──▶ Registry
//!                              │                                          ConfigStore
//!   SIGINT / SIGTERM ─────────▶│
//!                              ▼
//!                     drain (deadline) → shutdown hook (registry reset)
//! ```
//!
//! Exit codes: `0` clean shutdown, `1` startup failure, `2` serve failure,
//! `3` drain timeout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use service_runtime::config::loader;
use service_runtime::environment::{Environment, ProcessVars};
use service_runtime::http::{build_router, AppState, ServiceIdentity, ENVIRONMENT};
use service_runtime::lifecycle::{LifecycleError, OsSignals, Orchestrator};
use service_runtime::observability::logging::{init_tracing, StructuredLogger};
use service_runtime::observability::metrics;
use service_runtime::{ConfigStore, Registry, RegistryError};

/// Keys copied from the environment into the config store at startup.
const STORED_VARS: [&str; 5] = ["K_SERVICE", "K_REVISION", "K_CONFIGURATION", "PORT", "GOOGLE_CLOUD_PROJECT"];

const STARTUP_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(name = "service-runtime")]
#[command(about = "HTTP service with graceful, deadline-bound shutdown", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port; wins over the file and PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match loader::load(args.config.as_deref(), &ProcessVars, args.port) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(STARTUP_FAILURE);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("failed to initialize tracing: {}", e);
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-runtime starting");
    tracing::info!(
        bind_address = %config.server.bind_address(),
        shutdown_grace_ms = config.server.shutdown_grace_ms,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        match config.metrics.address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.metrics.address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(Registry::new());
    let env = match register_resources(&registry).and_then(|()| registry.get::<Environment>(ENVIRONMENT)) {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register resources");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };

    let identity = ServiceIdentity::resolve(&env).await;
    tracing::info!(
        name = %identity.name,
        revision = %identity.revision,
        project = %identity.project_id,
        region = %identity.region,
        "Service identity resolved"
    );

    let store = Arc::new(ConfigStore::new());
    for key in STORED_VARS {
        store.load_from_env(key);
    }

    let logger = Arc::new(StructuredLogger::stdout(
        identity.name.clone(),
        identity.project_id.clone(),
    ));
    let state = AppState {
        registry: Arc::clone(&registry),
        store,
        logger,
        identity: Arc::new(identity),
    };
    let app = build_router(state, &config.server);

    let signals = match OsSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            let err = LifecycleError::Signal(e);
            tracing::error!(error = %err, "Failed to install signal handlers");
            return ExitCode::from(err.exit_code());
        }
    };

    let result = Orchestrator::new(config.server.clone(), signals)
        .run(app, move |ctx| async move {
            tracing::info!(
                signal = %ctx.signal(),
                remaining = ?ctx.remaining(),
                resources = registry.count(),
                "Releasing registered resources"
            );
            registry.reset();
        })
        .await;

    match result {
        Ok(signal) => {
            tracing::info!(%signal, "Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Shutdown with error");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Shared resources available to handlers.
fn register_resources(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_lazy(ENVIRONMENT, |r| {
        if let Err(e) = r.register(ENVIRONMENT, Environment::from_process()) {
            tracing::error!(error = %e, "Failed to register environment");
        }
    })
}
