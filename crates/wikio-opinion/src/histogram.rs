//! Population histogram of a theory's opinions.
//!
//! Each opinion is placed at `0.5 − true_ratio` on `[-0.5, 0.5]`, so the
//! left-most bin holds opinions giving everything to true.

use serde::{Deserialize, Serialize};

use crate::points::OpinionSnapshot;

const MIN_BINS: usize = 6;
const MAX_BINS: usize = 24;
const OPINIONS_PER_STEP: usize = 18;

/// Bin count for a population of `n` opinions:
/// `min(24, max(6, 6 × (⌊n / 18⌋ − 1)))`.
pub fn bin_count(n: usize) -> usize {
    let steps = (n / OPINIONS_PER_STEP).saturating_sub(1);
    (MIN_BINS * steps).clamp(MIN_BINS, MAX_BINS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationHistogram {
    /// Opinion count per bin, left (true) to right (false)
    pub counts: Vec<usize>,
}

impl PopulationHistogram {
    /// Histogram of every non-empty opinion.
    pub fn from_opinions<'a, I>(opinions: I) -> Self
    where
        I: IntoIterator<Item = &'a OpinionSnapshot>,
    {
        let ratios: Vec<f64> = opinions
            .into_iter()
            .map(|o| o.effective())
            .filter(|p| !p.is_zero())
            .map(|p| p.true_ratio())
            .collect();
        Self::from_ratios(&ratios)
    }

    /// Histogram of raw true ratios in `[0, 1]`.
    pub fn from_ratios(ratios: &[f64]) -> Self {
        let mut counts = vec![0; bin_count(ratios.len())];
        for &ratio in ratios {
            let bin = bin_index(ratio, counts.len());
            counts[bin] += 1;
        }
        Self { counts }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Bin holding an opinion with the given true ratio.
    pub fn bin_of(&self, true_ratio: f64) -> usize {
        bin_index(true_ratio, self.counts.len())
    }
}

fn bin_index(true_ratio: f64, bins: usize) -> usize {
    let x = (0.5 - true_ratio.clamp(0.0, 1.0)) + 0.5;
    // The right edge belongs to the last bin.
    ((x * bins as f64).floor() as usize).min(bins - 1)
}
