//! Tunable thresholds for aggregation.

use serde::{Deserialize, Serialize};

/// Default share (in percent) both sides must exceed for a dependency to be
/// controversial in the aggregate.
pub const DEFAULT_CONTROVERSIAL_PCT: f64 = 30.0;

/// Default true ratio at or above which an opinion is a supporter (and the
/// false ratio at or above which it is an opposer).
pub const DEFAULT_SUPPORTER_RATIO: f64 = 0.666;

/// Thresholds used by classification and the Stats buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpinionConfig {
    /// Both the true and the false share of an aggregate dependency must
    /// exceed this percentage for it to be controversial.
    pub controversial_pct: f64,
    /// Ratio that makes an opinion a supporter / opposer.
    pub supporter_ratio: f64,
}

impl Default for OpinionConfig {
    fn default() -> Self {
        Self {
            controversial_pct: DEFAULT_CONTROVERSIAL_PCT,
            supporter_ratio: DEFAULT_SUPPORTER_RATIO,
        }
    }
}
