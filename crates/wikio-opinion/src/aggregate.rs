//! Opinion totals as percentages.
//!
//! ```text
//! true_pct  = 100 × Σ true / Σ (true + false)
//! false_pct = 100 − true_pct
//! ```
//!
//! A forced ratio replaces the sums. An empty opinion is 0 / 0, never a
//! division by zero.

use serde::{Deserialize, Serialize};

use crate::points::{Dependency, OpinionSnapshot, Points};

/// Normalized true/false totals of an opinion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentages {
    pub true_pct: f64,
    pub false_pct: f64,
}

impl Percentages {
    /// Both sides zero.
    pub const EMPTY: Percentages = Percentages {
        true_pct: 0.0,
        false_pct: 0.0,
    };

    /// Percentages of a single point pair.
    pub fn of(points: Points) -> Self {
        if points.is_zero() {
            return Self::EMPTY;
        }
        let true_pct = 100.0 * points.true_points() / points.total();
        Self {
            true_pct,
            false_pct: 100.0 - true_pct,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.true_pct == 0.0 && self.false_pct == 0.0
    }
}

/// Aggregate an ordered list of dependencies, honoring a forced ratio.
///
/// Deleted dependencies are ignored.
pub fn aggregate(dependencies: &[Dependency], forced: Option<Points>) -> Percentages {
    match forced {
        Some(ratio) => Percentages::of(ratio),
        None => Percentages::of(
            dependencies
                .iter()
                .filter(|d| d.is_live())
                .map(|d| d.points)
                .sum(),
        ),
    }
}

/// Aggregate a whole snapshot.
pub fn aggregate_opinion(opinion: &OpinionSnapshot) -> Percentages {
    aggregate(&opinion.dependencies, opinion.forced)
}

/// Fractions of all points split by side and by fact (verifiable evidence)
/// versus everything else. Sums to 1 unless the opinion is empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointDistribution {
    pub true_facts: f64,
    pub true_other: f64,
    pub false_facts: f64,
    pub false_other: f64,
}

pub fn point_distribution(opinion: &OpinionSnapshot) -> PointDistribution {
    let mut dist = PointDistribution::default();
    let mut total = 0.0;

    for dependency in opinion.live() {
        let points = dependency.points;
        if dependency.kind.is_fact() {
            dist.true_facts += points.true_points();
            dist.false_facts += points.false_points();
        } else {
            dist.true_other += points.true_points();
            dist.false_other += points.false_points();
        }
        total += points.total();
    }

    if total > 0.0 {
        dist.true_facts /= total;
        dist.true_other /= total;
        dist.false_facts /= total;
        dist.false_other /= total;
    }
    dist
}
