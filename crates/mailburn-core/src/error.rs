//! Error types for the core library.

use thiserror::Error;

use crate::gateway::Action;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The address source was unreachable or returned no candidate.
    #[error("Address generation failed: {0}")]
    GenerationFailure(String),

    /// Address is malformed (must contain exactly one `@`).
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Address is not present in the registry.
    #[error("Address not tracked: {0}")]
    NotTracked(String),

    /// The mailbox service could not be reached or answered with a failure.
    #[error("Transport failure during {action}: {reason}")]
    TransportFailure {
        /// Wire action that failed.
        action: Action,
        /// What went wrong.
        reason: String,
    },

    /// Lifetime was zero or overflowed.
    #[error("Invalid lifetime: {0}")]
    InvalidLifetime(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a transport failure for the given wire action.
    #[must_use]
    pub fn transport(action: Action, reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            action,
            reason: reason.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
