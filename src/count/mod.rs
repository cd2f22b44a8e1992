// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Counting engine and public entry points.
//!
//! The submodules layer the engine bottom-up: [`mask`] supplies the index
//! bitsets, [`enumerator`] the row-by-row backtracking core with completion
//! fusion, [`first_column`] the symmetry reduction, [`parallel`] the
//! fork-join driver and [`dispatch`] the path selection. [`fast_path`]
//! short-circuits r = 2 with a closed form.
//!
//! Convenience functions at this level run against a default [`Counter`];
//! hold your own `Counter` to control the cache directory or progress
//! reporting.

pub mod dispatch;
pub mod enumerator;
pub mod fast_path;
pub mod first_column;
pub mod mask;
pub mod parallel;
pub mod statistics;

use std::fmt;
use std::time::Duration;

pub use dispatch::{CountOptions, Counter, Mode};

use crate::error::CountError;

/// Signed counts for one (r, n) dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountResult {
    pub r: usize,
    pub n: usize,
    /// Rectangles with sign +1.
    pub positive: u128,
    /// Rectangles with sign −1.
    pub negative: u128,
    /// positive − negative.
    pub difference: i128,
    pub computation_time: Duration,
    /// True when this value came from a result store rather than a fresh
    /// computation.
    pub from_cache: bool,
}

impl CountResult {
    /// Total number of normalized (r, n) rectangles.
    pub fn total(&self) -> u128 {
        self.positive + self.negative
    }

    /// Assemble a result from a driver report, applying the symmetry
    /// factor to the raw per-representative sums.
    pub(crate) fn from_scaled(
        r: usize,
        n: usize,
        report: &parallel::DriverReport,
        factor: u128,
        computation_time: Duration,
    ) -> Self {
        let positive = report.positive * factor;
        let negative = report.negative * factor;
        Self {
            r,
            n,
            positive,
            negative,
            difference: positive as i128 - negative as i128,
            computation_time,
            from_cache: false,
        }
    }
}

impl fmt::Display for CountResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}): {} positive, {} negative (difference {:+})",
            self.r, self.n, self.positive, self.negative, self.difference
        )
    }
}

/// Count normalized (r, n) rectangles by sign with default options.
///
/// Uses the default cache directory; construct a [`Counter`] to override.
pub fn count(r: usize, n: usize) -> Result<CountResult, CountError> {
    Counter::new().count(r, n)
}

/// Count (r, n) and the forced completions (r+1, n) in one sweep.
/// Requires r = n − 1.
pub fn count_with_completion(
    r: usize,
    n: usize,
) -> Result<(CountResult, CountResult), CountError> {
    Counter::new().count_with_completion(r, n, &CountOptions::default(), None)
}

/// Count every valid pair of the given ranges, ascending n then r.
pub fn count_range(
    r_range: std::ops::RangeInclusive<usize>,
    n_range: std::ops::RangeInclusive<usize>,
) -> Result<Vec<CountResult>, CountError> {
    Counter::new().count_range(r_range, n_range, &CountOptions::default())
}
