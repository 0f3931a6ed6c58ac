//! The aggregate ("Stats") opinion of a theory.
//!
//! Stats are recomputed from the full set of opinions, never patched in place.
//! Every member opinion carries equal weight: it contributes its normalized
//! totals and its per-dependency shares of its own points.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::Percentages;
use crate::config::OpinionConfig;
use crate::points::{Dependency, DependencyId, OpinionSnapshot, Points};

/// Population a Stats aggregate is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsKind {
    All,
    Supporters,
    Moderates,
    Opposers,
}

impl StatsKind {
    pub const ALL_KINDS: [StatsKind; 4] = [
        StatsKind::All,
        StatsKind::Supporters,
        StatsKind::Moderates,
        StatsKind::Opposers,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            StatsKind::All => "all",
            StatsKind::Supporters => "supporters",
            StatsKind::Moderates => "moderates",
            StatsKind::Opposers => "opposers",
        }
    }

    /// Range of true ratios covered by this population.
    pub fn point_range(&self, config: &OpinionConfig) -> (f64, f64) {
        let r = config.supporter_ratio;
        match self {
            StatsKind::All => (0.0, 1.0),
            StatsKind::Supporters => (r, 1.0),
            StatsKind::Moderates => (1.0 - r, r),
            StatsKind::Opposers => (0.0, 1.0 - r),
        }
    }

    /// Whether an opinion belongs to this population. Empty opinions never do.
    pub fn admits(&self, opinion: &OpinionSnapshot, config: &OpinionConfig) -> bool {
        let points = opinion.effective();
        if points.is_zero() {
            return false;
        }
        let r = config.supporter_ratio;
        match self {
            StatsKind::All => true,
            StatsKind::Supporters => points.true_ratio() >= r,
            StatsKind::Moderates => points.true_ratio() < r && points.false_ratio() < r,
            StatsKind::Opposers => points.false_ratio() >= r,
        }
    }
}

impl std::fmt::Display for StatsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Unknown stats slug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stats kind: {0}")]
pub struct UnknownStatsKind(pub String);

impl FromStr for StatsKind {
    type Err = UnknownStatsKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatsKind::ALL_KINDS
            .into_iter()
            .find(|k| k.slug() == s)
            .ok_or_else(|| UnknownStatsKind(s.to_string()))
    }
}

/// Aggregate opinion over one population of a theory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub kind: StatsKind,
    /// Sum of the members' normalized opinion totals
    pub total: Points,
    /// Summed per-dependency shares, in first-seen order
    pub dependencies: Vec<Dependency>,
    /// Number of member opinions
    pub members: usize,
}

impl Stats {
    /// An aggregate with no members.
    pub fn empty(kind: StatsKind) -> Self {
        Self {
            kind,
            total: Points::ZERO,
            dependencies: Vec::new(),
            members: 0,
        }
    }

    /// Build the aggregate of `kind` from every opinion on the theory.
    pub fn recalculate<'a, I>(kind: StatsKind, opinions: I, config: &OpinionConfig) -> Self
    where
        I: IntoIterator<Item = &'a OpinionSnapshot>,
    {
        let mut stats = Stats::empty(kind);
        let mut index: HashMap<DependencyId, usize> = HashMap::new();

        for opinion in opinions {
            if !kind.admits(opinion, config) {
                continue;
            }
            let effective = opinion.effective();
            stats.total = stats.total + effective.scaled(1.0 / effective.total());
            stats.members += 1;

            let dependency_total = opinion.totals().total();
            if dependency_total == 0.0 {
                continue;
            }
            for dependency in opinion.live() {
                let share = dependency.points.scaled(1.0 / dependency_total);
                match index.get(&dependency.id) {
                    Some(&slot) => {
                        let entry = &mut stats.dependencies[slot];
                        entry.points = entry.points + share;
                    }
                    None => {
                        index.insert(dependency.id, stats.dependencies.len());
                        stats.dependencies.push(Dependency {
                            id: dependency.id,
                            points: share,
                            deleted: false,
                            kind: dependency.kind,
                        });
                    }
                }
            }
        }

        debug!(
            kind = %kind,
            members = stats.members,
            dependencies = stats.dependencies.len(),
            "recalculated stats"
        );
        stats
    }

    /// All four populations at once.
    pub fn recalculate_all(opinions: &[OpinionSnapshot], config: &OpinionConfig) -> Vec<Stats> {
        StatsKind::ALL_KINDS
            .into_iter()
            .map(|kind| Stats::recalculate(kind, opinions, config))
            .collect()
    }

    pub fn true_ratio(&self) -> f64 {
        self.total.true_ratio()
    }

    pub fn false_ratio(&self) -> f64 {
        self.total.false_ratio()
    }

    pub fn percentages(&self) -> Percentages {
        Percentages::of(self.total)
    }

    /// Member count weighted by the true ratio, rounded.
    pub fn num_supporters(&self) -> usize {
        (self.true_ratio() * self.members as f64).round() as usize
    }

    /// Member count weighted by the false ratio, rounded.
    pub fn num_opposers(&self) -> usize {
        (self.false_ratio() * self.members as f64).round() as usize
    }

    /// The aggregate as a snapshot, for comparison with a single opinion.
    ///
    /// The totals are carried as a forced ratio so the snapshot aggregates to
    /// the same percentages as the Stats themselves.
    pub fn snapshot(&self) -> OpinionSnapshot {
        OpinionSnapshot {
            dependencies: self.dependencies.clone(),
            forced: Some(self.total),
        }
    }
}
