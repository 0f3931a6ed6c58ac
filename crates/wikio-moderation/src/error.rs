//! Error types for moderation.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::level::Level;

/// Result type for moderation operations.
pub type Result<T> = std::result::Result<T, ModerationError>;

/// Errors raised by the moderation core.
///
/// The state machine itself never fails on a well-formed history; these
/// guard the inputs that build one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    /// Level outside 0-4
    #[error("invalid level: {0}")]
    InvalidLevel(u8),

    /// Event older than the last recorded one
    #[error("event at {at} precedes last recorded event at {last}")]
    OutOfOrder {
        at: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    /// Identical strike already recorded
    #[error("duplicate strike at {0}")]
    Duplicate(DateTime<Utc>),

    /// Lifetime ban prevents holding the level
    #[error("user is banned from level {0}")]
    LevelBanned(Level),

    /// Violation poll already closed
    #[error("violation {0} is closed")]
    ViolationClosed(u64),

    /// Poll still running and the closer cannot override it
    #[error("violation {id} is polling until {deadline}")]
    PollRunning { id: u64, deadline: DateTime<Utc> },

    /// Level lacks the permission
    #[error("level {level} may not {action}")]
    NotPermitted { action: &'static str, level: Level },
}
