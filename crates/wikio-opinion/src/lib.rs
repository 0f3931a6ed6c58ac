//! Opinion Aggregation
//!
//! Turns per-dependency true/false point allocations into the numbers Wiki-O
//! shows for a theory, and compares a single opinion with the aggregate
//! ("Stats") opinion.
//!
//! # Pipeline
//!
//! 1. Raw points are validated at the boundary ([`Points::new`])
//! 2. Dependencies are summed into true/false percentages ([`aggregate`])
//! 3. Each dependency is labelled against the aggregate ([`classify`])
//!
//! Everything here is a pure function of its inputs: no shared state, no
//! failure modes past validation, safe to call concurrently.
//!
//! # Percentages
//!
//! - total > 0 → `true_pct + false_pct = 100`
//! - total = 0 → `0 / 0`
//! - forced ratio → the ratio wins, dependency sums are left alone

mod aggregate;
mod classify;
mod config;
mod histogram;
mod points;
mod stats;

pub use aggregate::{aggregate, aggregate_opinion, point_distribution, Percentages, PointDistribution};
pub use classify::{analyze, classify, classify_points, is_controversial, Classification, OpinionAnalysis};
pub use config::{OpinionConfig, DEFAULT_CONTROVERSIAL_PCT, DEFAULT_SUPPORTER_RATIO};
pub use histogram::{bin_count, PopulationHistogram};
pub use points::{Dependency, DependencyId, DependencyKind, OpinionSnapshot, Points, PointsError, Side};
pub use stats::{Stats, StatsKind, UnknownStatsKind};
