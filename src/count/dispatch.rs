// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Dispatcher: validation, path selection and cache management.
//!
//! One entry point fans out to the closed form (r = 2), the first-column
//! reducer with a single- or multi-worker backend (r ≥ 3), or the fused
//! completion sweep (r = n−1 together with r+1). The choice of backend is
//! a heuristic and carries no contract — every path produces identical
//! counts — but the heuristic itself is fixed: parallelism pays off only
//! once the sequential run would take a few tenths of a second, which by
//! measurement means r ≥ 5 for n ≤ 6, r ≥ 4 for n = 7 and r ≥ 3 from
//! n = 8 up.
//!
//! The dispatcher also owns the table of active derangement caches, keyed
//! by n. Caches are built or loaded on first use, explicitly, and shared
//! immutably from then on; there is no global state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::cache::DerangementCache;
use crate::count::fast_path::count_two_rows;
use crate::count::first_column::{symmetry_factor, FirstColumns};
use crate::count::parallel::{
    run_first_column_units, run_row_partitions, CancelToken, DriverReport,
};
use crate::count::CountResult;
use crate::error::CountError;
use crate::progress::{NullProgress, ProgressSink};
use crate::store::ResultStore;

/// Default directory for persisted derangement caches.
pub const DEFAULT_CACHE_DIR: &str = "cache/smart_derangements";

/// Upper bound on automatically selected workers.
pub const MAX_AUTO_WORKERS: usize = 8;

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Pick single or parallel by the empirical threshold table.
    #[default]
    Auto,
    /// Force one worker.
    Single,
    /// Force the parallel driver.
    Parallel,
}

/// Options accepted by the counting entry points.
#[derive(Debug, Clone)]
pub struct CountOptions {
    pub mode: Mode,
    /// Worker count; `None` selects
    /// min(hardware parallelism, work units, [`MAX_AUTO_WORKERS`]).
    pub workers: Option<usize>,
    /// Allow the fused (n−1, n)/(n, n) sweep where applicable.
    pub fuse: bool,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            workers: None,
            fuse: true,
        }
    }
}

/// Counting front end holding the cache table and progress sink.
pub struct Counter {
    cache_dir: PathBuf,
    caches: Mutex<HashMap<usize, Arc<DerangementCache>>>,
    progress: Arc<dyn ProgressSink>,
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter {
    /// Counter with the default cache directory and no progress reporting.
    pub fn new() -> Self {
        Self::with_cache_dir(DEFAULT_CACHE_DIR)
    }

    /// Counter persisting caches under `cache_dir`.
    pub fn with_cache_dir(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            caches: Mutex::new(HashMap::new()),
            progress: Arc::new(NullProgress),
        }
    }

    /// Replace the progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// The active cache for n, loading or building it on first use.
    pub fn cache_for(&self, n: usize) -> Result<Arc<DerangementCache>, CountError> {
        let mut caches = self.caches.lock().unwrap();
        if let Some(cache) = caches.get(&n) {
            return Ok(Arc::clone(cache));
        }
        let cache = Arc::new(DerangementCache::load_or_build(n, &self.cache_dir)?);
        caches.insert(n, Arc::clone(&cache));
        Ok(cache)
    }

    /// Count normalized (r, n) rectangles by sign, with default options.
    pub fn count(&self, r: usize, n: usize) -> Result<CountResult, CountError> {
        self.count_with_options(r, n, &CountOptions::default(), None)
    }

    /// Count normalized (r, n) rectangles by sign.
    pub fn count_with_options(
        &self,
        r: usize,
        n: usize,
        options: &CountOptions,
        cancel: Option<&CancelToken>,
    ) -> Result<CountResult, CountError> {
        validate_dimensions(r, n)?;
        let started = Instant::now();

        if r == 2 {
            self.progress.on_start(r, n, 1);
            let (positive, negative, difference) = count_two_rows(n);
            let result = CountResult {
                r,
                n,
                positive,
                negative,
                difference,
                computation_time: started.elapsed(),
                from_cache: false,
            };
            self.progress.on_finish(&result);
            return Ok(result);
        }

        let cache = self.cache_for(n)?;
        let units: Vec<Vec<u8>> = FirstColumns::new(r, n).collect();
        let workers = resolve_workers(options, units.len(), r, n);
        debug!(r, n, units = units.len(), workers, "count dispatch");
        self.progress.on_start(r, n, units.len() as u64);

        let report = if units.len() == 1 && workers > 1 {
            // A single canonical first column (r = n): fall back to
            // partitioning row-1 derangement indices.
            run_row_partitions(
                &cache,
                r,
                Some(units[0].as_slice()),
                workers,
                false,
                &*self.progress,
                cancel,
            )?
        } else {
            run_first_column_units(&cache, r, &units, workers, false, &*self.progress, cancel)?
        };
        check_not_cancelled(&report)?;

        let factor = symmetry_factor(r);
        let result = CountResult::from_scaled(r, n, &report, factor, started.elapsed());
        self.progress.on_finish(&result);
        Ok(result)
    }

    /// Count (r, n) and its unique completions (r+1, n) together.
    /// Requires r = n − 1.
    pub fn count_with_completion(
        &self,
        r: usize,
        n: usize,
        options: &CountOptions,
        cancel: Option<&CancelToken>,
    ) -> Result<(CountResult, CountResult), CountError> {
        validate_dimensions(r, n)?;
        if r != n - 1 {
            return Err(CountError::InvalidInput(format!(
                "completion counting requires r = n - 1, got r={}, n={}",
                r, n
            )));
        }

        if r == 2 {
            // n = 3: the base dimension has a closed form, and the fused
            // sweep needs at least three enumerated rows. Counting the two
            // dimensions separately is equally exact here.
            let base = self.count_with_options(r, n, options, cancel)?;
            let completed = self.count_with_options(n, n, options, cancel)?;
            return Ok((base, completed));
        }

        let started = Instant::now();
        let cache = self.cache_for(n)?;
        let units: Vec<Vec<u8>> = FirstColumns::new(r, n).collect();
        let workers = resolve_workers(options, units.len(), r, n);
        debug!(r, n, units = units.len(), workers, "fused count dispatch");
        self.progress.on_start(r, n, units.len() as u64);

        let report =
            run_first_column_units(&cache, r, &units, workers, true, &*self.progress, cancel)?;
        check_not_cancelled(&report)?;

        // Row interchange fixes the completion row along with the column
        // multiset, so both dimensions scale by the same (r−1)!.
        let factor = symmetry_factor(r);
        let elapsed = started.elapsed();
        let base = CountResult::from_scaled(r, n, &report, factor, elapsed);
        let completed = CountResult {
            r: r + 1,
            n,
            positive: report.fused_positive * factor,
            negative: report.fused_negative * factor,
            difference: (report.fused_positive * factor) as i128
                - (report.fused_negative * factor) as i128,
            computation_time: elapsed,
            from_cache: false,
        };
        debug_assert_eq!(base.total(), completed.total());
        self.progress.on_finish(&base);
        self.progress.on_finish(&completed);
        Ok((base, completed))
    }

    /// Count every r from 2 to n for one n, fusing the last two dimensions
    /// when permitted.
    pub fn count_for_n(
        &self,
        n: usize,
        options: &CountOptions,
    ) -> Result<Vec<CountResult>, CountError> {
        if n < 2 {
            return Err(CountError::InvalidInput(format!(
                "n must be >= 2, got n={}",
                n
            )));
        }
        let mut results = Vec::with_capacity(n - 1);
        let mut r = 2;
        while r <= n {
            if options.fuse && n >= 3 && r == n - 1 {
                let (base, completed) = self.count_with_completion(r, n, options, None)?;
                results.push(base);
                results.push(completed);
                break;
            }
            results.push(self.count_with_options(r, n, options, None)?);
            r += 1;
        }
        Ok(results)
    }

    /// Count every valid pair in the given ranges, ascending n then
    /// ascending r, skipping pairs with r > n.
    pub fn count_range(
        &self,
        r_range: std::ops::RangeInclusive<usize>,
        n_range: std::ops::RangeInclusive<usize>,
        options: &CountOptions,
    ) -> Result<Vec<CountResult>, CountError> {
        if *r_range.start() < 2 || *n_range.start() < 2 {
            return Err(CountError::InvalidInput(
                "ranges must start at 2 or above".to_string(),
            ));
        }
        let mut results = Vec::new();
        for n in n_range {
            let r_hi = (*r_range.end()).min(n);
            let mut r = *r_range.start();
            while r <= r_hi {
                let fusable = options.fuse && r == n - 1 && r >= 2 && r_hi == n;
                if fusable {
                    let (base, completed) = self.count_with_completion(r, n, options, None)?;
                    results.push(base);
                    results.push(completed);
                    break;
                }
                results.push(self.count_with_options(r, n, options, None)?);
                r += 1;
            }
        }
        Ok(results)
    }

    /// Store-consulting wrapper: return the stored result if present,
    /// otherwise compute and persist. Counts are bit-exact identical with
    /// and without the store.
    pub fn count_with_store(
        &self,
        store: &dyn ResultStore,
        r: usize,
        n: usize,
        options: &CountOptions,
    ) -> Result<CountResult, CountError> {
        validate_dimensions(r, n)?;
        if let Some(mut hit) = store.lookup(r, n) {
            hit.from_cache = true;
            return Ok(hit);
        }
        let result = self.count_with_options(r, n, options, None)?;
        store.store(&result);
        Ok(result)
    }
}

fn validate_dimensions(r: usize, n: usize) -> Result<(), CountError> {
    if r < 2 || n < 2 || r > n {
        return Err(CountError::InvalidInput(format!(
            "dimensions must satisfy 2 <= r <= n, got r={}, n={}",
            r, n
        )));
    }
    Ok(())
}

fn check_not_cancelled(report: &DriverReport) -> Result<(), CountError> {
    if report.cancelled {
        return Err(CountError::Cancelled {
            partial_positive: report.positive,
            partial_negative: report.negative,
            units_done: report.units_done,
            units_total: report.units_total,
        });
    }
    Ok(())
}

/// Parallelism pay-off table, from measurements of the sequential engine.
fn should_use_parallel(r: usize, n: usize) -> bool {
    if n <= 6 {
        r >= 5
    } else if n == 7 {
        r >= 4
    } else {
        r >= 3
    }
}

fn resolve_workers(options: &CountOptions, units: usize, r: usize, n: usize) -> usize {
    let auto = || {
        let hardware = thread::available_parallelism().map(|p| p.get()).unwrap_or(1);
        hardware.min(units.max(1)).min(MAX_AUTO_WORKERS)
    };
    let requested = options.workers.unwrap_or_else(auto).max(1);
    match options.mode {
        Mode::Single => 1,
        Mode::Parallel => requested,
        Mode::Auto => {
            if should_use_parallel(r, n) {
                requested
            } else {
                1
            }
        }
    }
}
