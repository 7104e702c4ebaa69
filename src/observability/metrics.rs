//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_resources` (gauge): registered resource names
//! - `registry_initializations_total` (counter): lazy initializers that ran
//! - `lifecycle_shutdowns_total` (counter): orchestrated shutdowns by outcome
//!
//! # Design Decisions
//! - Prometheus exporter is optional; without it every call is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_registry_size(size: usize) {
    ::metrics::gauge!("registry_resources").set(size as f64);
}

pub fn record_initialization() {
    ::metrics::counter!("registry_initializations_total").increment(1);
}

/// Record how an orchestrated run ended (`stopped`, `failed`, `drain_timeout`).
pub fn record_shutdown(outcome: &'static str) {
    ::metrics::counter!("lifecycle_shutdowns_total", "outcome" => outcome).increment(1);
}
