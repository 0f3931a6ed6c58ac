//! Error types for the Wiki-O node.

use thiserror::Error;
use wikio_moderation::{ModerationError, UserId};
use wikio_opinion::PointsError;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Moderation rule refused the operation
    #[error("Moderation error: {0}")]
    Moderation(#[from] ModerationError),

    /// Invalid opinion points
    #[error("Invalid points: {0}")]
    Points(#[from] PointsError),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The user's history moved since it was read; recompute and retry
    #[error("Stale state for {user}: expected version {expected}, found {actual}")]
    Stale {
        user: UserId,
        expected: u64,
        actual: u64,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
