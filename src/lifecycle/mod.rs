//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator (orchestrator.rs):
//!     bind listener ──fail──▶ BindFailure (hook never runs)
//!         │
//!         ▼
//!     spawn serve loop ──┬── serve loop exits ──▶ Serve error (hook never runs)
//!                        └── signal received
//!                                 │
//!                                 ▼
//!     stop accepting → drain in-flight (deadline) → shutdown hook → return
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Signal::{Terminate, Interrupt}
//!     Shutdown::trigger() → Signal::Requested
//! ```
//!
//! # Design Decisions
//! - Exactly one of {serve failure, signal} decides the outcome
//! - Shutdown has a deadline: the drain is abandoned after it, the hook
//!   still runs with the expired context
//! - The hook runs exactly once, after the listener is closed

pub mod error;
pub mod orchestrator;
pub mod shutdown;
pub mod signals;

pub use error::LifecycleError;
pub use orchestrator::{BoundServer, Orchestrator};
pub use shutdown::{Shutdown, ShutdownContext, ShutdownListener};
pub use signals::{OsSignals, Signal, SignalSource};
