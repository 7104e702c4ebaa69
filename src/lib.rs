//! Service runtime library.
//!
//! Two building blocks for long-running network services:
//!
//! - [`registry`]: named, shared resources (clients, pools) registered
//!   eagerly or lazily, initialized at most once and retrieved with a checked
//!   type.
//! - [`lifecycle`]: run an HTTP server until SIGINT/SIGTERM, drain in-flight
//!   requests within a deadline, then run a cleanup hook exactly once.
//!
//! Supporting modules cover configuration, environment lookups, a flat
//! key/value store and structured logging.

// Core subsystems
pub mod lifecycle;
pub mod registry;

// Supporting subsystems
pub mod config;
pub mod environment;
pub mod http;
pub mod store;

// Cross-cutting concerns
pub mod observability;

pub use config::RuntimeConfig;
pub use lifecycle::{LifecycleError, Orchestrator, Shutdown, ShutdownContext, Signal};
pub use registry::{Registry, RegistryError};
pub use store::ConfigStore;
