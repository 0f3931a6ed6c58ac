//! Validated point allocations and the snapshots built from them.
//!
//! Points enter the crate through [`Points::new`] (or deserialization, which
//! goes through the same check). Everything downstream assumes non-negative,
//! finite values and never fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected point input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PointsError {
    /// A point value below zero
    #[error("negative {side} points: {value}")]
    Negative { side: Side, value: f64 },

    /// NaN or infinity
    #[error("non-finite {side} points")]
    NonFinite { side: Side },
}

/// The two sides of a theory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    True,
    False,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::True => f.write_str("true"),
            Side::False => f.write_str("false"),
        }
    }
}

/// A true/false point pair. Both values are finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPoints")]
pub struct Points {
    true_points: f64,
    false_points: f64,
}

#[derive(Deserialize)]
struct RawPoints {
    true_points: f64,
    false_points: f64,
}

impl TryFrom<RawPoints> for Points {
    type Error = PointsError;

    fn try_from(raw: RawPoints) -> Result<Self, Self::Error> {
        Points::new(raw.true_points, raw.false_points)
    }
}

fn check(side: Side, value: f64) -> Result<f64, PointsError> {
    if !value.is_finite() {
        return Err(PointsError::NonFinite { side });
    }
    if value < 0.0 {
        return Err(PointsError::Negative { side, value });
    }
    Ok(value)
}

impl Points {
    /// No points on either side.
    pub const ZERO: Points = Points {
        true_points: 0.0,
        false_points: 0.0,
    };

    /// Validate a point pair.
    pub fn new(true_points: f64, false_points: f64) -> Result<Self, PointsError> {
        Ok(Self {
            true_points: check(Side::True, true_points)?,
            false_points: check(Side::False, false_points)?,
        })
    }

    pub fn true_points(&self) -> f64 {
        self.true_points
    }

    pub fn false_points(&self) -> f64 {
        self.false_points
    }

    pub fn total(&self) -> f64 {
        self.true_points + self.false_points
    }

    /// True when no points are allocated.
    pub fn is_zero(&self) -> bool {
        self.total() == 0.0
    }

    /// Share of the total awarded to true, in `[0, 1]`. Zero when empty.
    pub fn true_ratio(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.true_points / total
        } else {
            0.0
        }
    }

    /// Share of the total awarded to false, in `[0, 1]`. Zero when empty.
    pub fn false_ratio(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.false_points / total
        } else {
            0.0
        }
    }

    /// The side holding the majority. Ties go to true; `None` when empty.
    pub fn dominant(&self) -> Option<Side> {
        if self.is_zero() {
            None
        } else if self.true_points >= self.false_points {
            Some(Side::True)
        } else {
            Some(Side::False)
        }
    }

    /// The same allocation with the sides exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            true_points: self.false_points,
            false_points: self.true_points,
        }
    }

    /// Scale both sides by a non-negative finite factor.
    pub(crate) fn scaled(&self, factor: f64) -> Self {
        debug_assert!(factor.is_finite() && factor >= 0.0);
        Self {
            true_points: self.true_points * factor,
            false_points: self.false_points * factor,
        }
    }
}

impl std::ops::Add for Points {
    type Output = Points;

    fn add(self, rhs: Points) -> Points {
        Points {
            true_points: self.true_points + rhs.true_points,
            false_points: self.false_points + rhs.false_points,
        }
    }
}

impl std::iter::Sum for Points {
    fn sum<I: Iterator<Item = Points>>(iter: I) -> Points {
        iter.fold(Points::ZERO, |acc, p| acc + p)
    }
}

/// Identifier of an evidence item or sub-theory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyId(pub u64);

impl std::fmt::Display for DependencyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a dependency points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyKind {
    /// A leaf. Verifiable evidence counts as fact.
    Evidence { verifiable: bool },
    /// A nested theory
    SubTheory,
}

impl Default for DependencyKind {
    fn default() -> Self {
        DependencyKind::Evidence { verifiable: false }
    }
}

impl DependencyKind {
    pub fn is_fact(&self) -> bool {
        matches!(self, DependencyKind::Evidence { verifiable: true })
    }
}

/// An evidence item or sub-theory with the points one opinion gives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub points: Points,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl Dependency {
    /// Build a live evidence dependency, validating the points.
    pub fn new(id: u64, true_points: f64, false_points: f64) -> Result<Self, PointsError> {
        Ok(Self {
            id: DependencyId(id),
            points: Points::new(true_points, false_points)?,
            deleted: false,
            kind: DependencyKind::default(),
        })
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// One owner's allocation over a theory's dependencies.
///
/// Used for user opinions and for the aggregate ("Stats") alike.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpinionSnapshot {
    pub dependencies: Vec<Dependency>,
    /// Manually fixed true/false ratio. Overrides the dependency sums.
    #[serde(default)]
    pub forced: Option<Points>,
}

impl OpinionSnapshot {
    pub fn new(dependencies: Vec<Dependency>) -> Self {
        Self {
            dependencies,
            forced: None,
        }
    }

    pub fn forced(mut self, ratio: Points) -> Self {
        self.forced = Some(ratio);
        self
    }

    /// Dependencies that are not deleted, in order.
    pub fn live(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.is_live())
    }

    /// Points of a live dependency; zero when absent or deleted.
    pub fn points_for(&self, id: DependencyId) -> Points {
        self.live()
            .find(|d| d.id == id)
            .map(|d| d.points)
            .unwrap_or(Points::ZERO)
    }

    /// Sum of all live dependency points.
    pub fn totals(&self) -> Points {
        self.live().map(|d| d.points).sum()
    }

    /// The opinion-level allocation: the forced ratio if set, else the sums.
    pub fn effective(&self) -> Points {
        self.forced.unwrap_or_else(|| self.totals())
    }

    /// Exchange true and false everywhere (the theory's title was inverted).
    pub fn swap_true_false(&mut self) {
        for dependency in &mut self.dependencies {
            dependency.points = dependency.points.swapped();
        }
        if let Some(forced) = self.forced.as_mut() {
            *forced = forced.swapped();
        }
    }
}
