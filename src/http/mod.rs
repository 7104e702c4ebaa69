//! HTTP surface of the service binary.
//!
//! # Data Flow
//! ```text
//! TCP connection (owned by lifecycle::Orchestrator)
//!     → server.rs (Axum router, request id, tracing, timeout)
//!     → handlers read shared state: Registry, ConfigStore, identity
//!     → StructuredLogger line per request (trace from header)
//! ```

pub mod server;

pub use server::{build_router, AppState, ServiceIdentity, ENVIRONMENT};
