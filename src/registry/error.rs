//! Registry error definitions.

use thiserror::Error;

/// Errors returned by [`Registry`](super::Registry) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No resource is registered under the requested name.
    #[error("no resource registered under '{0}'")]
    NotFound(String),

    /// The entry was reserved but neither an initializer nor a value was supplied.
    #[error("resource '{0}' has no initializer and no value")]
    Uninitializable(String),

    /// The stored value is not of the requested type.
    #[error("resource '{name}' holds {found}, not the requested {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Resource names must be non-empty.
    #[error("resource name must not be empty")]
    InvalidName,
}
