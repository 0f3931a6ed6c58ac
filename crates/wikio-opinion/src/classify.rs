//! Dependency classification against the aggregate opinion.
//!
//! Each live dependency of either snapshot gets exactly one label, checked in
//! this order:
//!
//! 1. **Unaccounted**: zero points on either side of the comparison.
//! 2. **Controversial**: the aggregate is near-balanced for it.
//! 3. **Contradicting**: dominant sides disagree.
//! 4. **Collaborative**: dominant sides agree.
//!
//! The comparison takes two immutable snapshots and nothing else.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate_opinion, Percentages};
use crate::config::OpinionConfig;
use crate::points::{DependencyId, OpinionSnapshot, Points};

/// How an opinion treats a dependency relative to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Unaccounted,
    Contradicting,
    Controversial,
    Collaborative,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Unaccounted,
        Classification::Contradicting,
        Classification::Controversial,
        Classification::Collaborative,
    ];
}

/// Whether an aggregate allocation is near-balanced.
pub fn is_controversial(aggregate: Points, config: &OpinionConfig) -> bool {
    let pct = Percentages::of(aggregate);
    !pct.is_empty()
        && pct.true_pct > config.controversial_pct
        && pct.false_pct > config.controversial_pct
}

/// Label one dependency from its two point pairs.
pub fn classify_points(mine: Points, aggregate: Points, config: &OpinionConfig) -> Classification {
    if mine.is_zero() || aggregate.is_zero() {
        return Classification::Unaccounted;
    }
    if is_controversial(aggregate, config) {
        return Classification::Controversial;
    }
    if mine.dominant() == aggregate.dominant() {
        Classification::Collaborative
    } else {
        Classification::Contradicting
    }
}

/// Label every live dependency appearing in either snapshot.
///
/// Order: the opinion's dependencies first, then those only the aggregate has.
pub fn classify(
    opinion: &OpinionSnapshot,
    stats: &OpinionSnapshot,
    config: &OpinionConfig,
) -> Vec<(DependencyId, Classification)> {
    let mut seen = HashSet::new();
    let ids: Vec<DependencyId> = opinion
        .live()
        .chain(stats.live())
        .map(|d| d.id)
        .filter(|id| seen.insert(*id))
        .collect();

    ids.into_iter()
        .map(|id| {
            let label = classify_points(opinion.points_for(id), stats.points_for(id), config);
            (id, label)
        })
        .collect()
}

/// Full comparison of an opinion against the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionAnalysis {
    pub percentages: Percentages,
    pub classifications: Vec<(DependencyId, Classification)>,
}

impl OpinionAnalysis {
    /// Label of a dependency, if it was classified.
    pub fn get(&self, id: DependencyId) -> Option<Classification> {
        self.classifications
            .iter()
            .find(|(dep, _)| *dep == id)
            .map(|(_, label)| *label)
    }

    /// Dependencies carrying a given label, in classification order.
    pub fn with_label(&self, label: Classification) -> impl Iterator<Item = DependencyId> + '_ {
        self.classifications
            .iter()
            .filter(move |(_, l)| *l == label)
            .map(|(id, _)| *id)
    }
}

/// Aggregate an opinion and classify its dependencies against `stats`.
pub fn analyze(
    opinion: &OpinionSnapshot,
    stats: &OpinionSnapshot,
    config: &OpinionConfig,
) -> OpinionAnalysis {
    OpinionAnalysis {
        percentages: aggregate_opinion(opinion),
        classifications: classify(opinion, stats, config),
    }
}
