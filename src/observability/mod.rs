//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, EnvFilter controlled)
//!     → metrics.rs (registry size, initializations, shutdown outcomes)
//!
//! Request handlers additionally produce:
//!     → logging.rs (one JSON line per entry, severity + trace)
//! ```
//!
//! # Design Decisions
//! - `tracing` for operational logs, JSON or pretty format
//! - Structured log entries keep a closed severity set; unknown severities
//!   fall back to DEFAULT instead of failing
//! - Metrics are cheap facade calls; no exporter means no-op

pub mod logging;
pub mod metrics;
