//! Wiki-O Moderation
//!
//! Tracks what users did wrong and derives what they are allowed to do.
//!
//! # Levels
//!
//! | Level | Role       | Entry                                        |
//! |-------|------------|----------------------------------------------|
//! | 0     | restricted | staff                                        |
//! | 1     | new user   | default, staff                               |
//! | 2     | trusted    | 10 days old, 10 contributions in 100 days    |
//! | 3     | moderator  | 100 days old, 100 contributions in 100 days  |
//! | 4     | staff      | staff                                        |
//!
//! Three accepted strikes inside 100 days demote by one level; three
//! demotions from a level ban the user from it (and everything above) for
//! life.
//!
//! # Flow
//!
//! 1. A report opens a [`Violation`] poll
//! 2. Closing the poll yields [`StrikeRecord`]s for the offender (and maybe the reporter)
//! 3. The caller appends them and re-derives the level with [`StateMachine::replay`]
//!
//! Nothing in this crate does I/O or holds locks; serializing updates per
//! user is the caller's job.

mod config;
mod error;
mod level;
mod machine;
mod permissions;
mod strike;
mod violation;

pub use config::{ModerationConfig, PromotionRule};
pub use error::{ModerationError, Result};
pub use level::{BanCounts, Level, LevelState};
pub use machine::{Evaluation, EvaluationInput, ModerationEvent, StateMachine, Transition};
pub use permissions::{ContentAccess, EditScope, LevelPermissions, PermissionTable, ReportTarget};
pub use strike::{StrikeHistory, StrikeKind, StrikeRecord, UserId};
pub use violation::{Closer, Feedback, Resolution, Violation, ViolationStatus, VoteAction};
