//! Moderation thresholds.

use serde::{Deserialize, Serialize};

use crate::level::Level;
use crate::strike::StrikeKind;

/// Automatic promotion from one level to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRule {
    pub from: Level,
    pub to: Level,
    pub min_account_age_days: i64,
    /// Contributions inside the contribution window
    pub min_contributions: usize,
}

/// Windows, counts and ladders used by the state machine and violation polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Accepted strikes are counted over this many trailing days
    pub strike_window_days: i64,
    /// Warnings are counted over this many trailing days
    pub warning_window_days: i64,
    /// Contributions are counted over this many trailing days
    pub contribution_window_days: i64,
    /// Accepted strikes in the window that trigger a demotion
    pub demotion_strikes: usize,
    /// Demotions from a level that ban the user from it for life
    pub ban_after_demotions: u32,
    pub promotions: Vec<PromotionRule>,
    /// Days a violation poll stays open
    pub poll_days: i64,
    /// Record filed against the reporter when a violation is ignored
    pub reporter_penalty: Option<StrikeKind>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            strike_window_days: 100,
            warning_window_days: 10,
            contribution_window_days: 100,
            demotion_strikes: 3,
            ban_after_demotions: 3,
            promotions: vec![
                PromotionRule {
                    from: Level::NEW_USER,
                    to: Level::TRUSTED,
                    min_account_age_days: 10,
                    min_contributions: 10,
                },
                PromotionRule {
                    from: Level::TRUSTED,
                    to: Level::MODERATOR,
                    min_account_age_days: 100,
                    min_contributions: 100,
                },
            ],
            poll_days: 10,
            reporter_penalty: None,
        }
    }
}

impl ModerationConfig {
    /// The rule that promotes out of `level`, if any.
    pub fn promotion_from(&self, level: Level) -> Option<&PromotionRule> {
        self.promotions.iter().find(|rule| rule.from == level)
    }
}
