// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Fork-join driver over first-column work units.
//!
//! Workers share nothing mutable: each receives the immutable cache
//! reference, builds its own enumerator (fresh mask buffers), processes a
//! statically assigned round-robin slice of the unit list, and returns its
//! accumulators. The driver merges once at join, so the final counts do
//! not depend on the worker count or on scheduling.
//!
//! Cancellation is cooperative. One shared atomic flag is checked before
//! each work unit and, inside the enumerator, between row-1 choices.
//! Cancelled workers return whatever they have; the merged result is
//! flagged and the caller reports it as an explicit cancellation rather
//! than a count.
//!
//! When the unit list is too short to spread (a single canonical first
//! column, as happens for r = n), the fallback partition hands each worker
//! every `stride`-th row-1 derangement index instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::cache::DerangementCache;
use crate::count::enumerator::Enumerator;
use crate::count::statistics::{Counters, Statistics};
use crate::error::CountError;
use crate::progress::ProgressSink;

/// Clonable handle to a shared cancellation flag.
///
/// Workers observe it at coarse boundaries only (per work unit, per row-1
/// choice); they never stop mid-row.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every task holding a clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Merged result of a driver run. Counts are raw per-representative sums;
/// the symmetry factor is applied by the caller, and never to partial
/// (cancelled) sums.
#[derive(Debug, Clone, Default)]
pub struct DriverReport {
    pub positive: u128,
    pub negative: u128,
    /// Counts of the (r+1, n) completions, present only in fused mode.
    pub fused_positive: u128,
    pub fused_negative: u128,
    pub units_done: u64,
    pub units_total: u64,
    pub cancelled: bool,
    pub stats: Statistics,
}

/// One worker's accumulators, merged at join.
#[derive(Debug, Default)]
struct WorkerPartial {
    positive: u128,
    negative: u128,
    fused_positive: u128,
    fused_negative: u128,
    units_done: u64,
    cancelled: bool,
    stats: Statistics,
}

/// Run the enumerator over the given first-column units, spread over
/// `workers` workers.
///
/// `fused` additionally counts the forced (r+1, n) completions (requires
/// r = n − 1).
pub fn run_first_column_units(
    cache: &DerangementCache,
    r: usize,
    units: &[Vec<u8>],
    workers: usize,
    fused: bool,
    progress: &dyn ProgressSink,
    cancel: Option<&CancelToken>,
) -> Result<DriverReport, CountError> {
    let units_total = units.len() as u64;
    debug!(
        r,
        n = cache.n(),
        units = units_total,
        workers,
        fused,
        "dispatching first-column work units"
    );

    let partials: Vec<WorkerPartial> = if workers <= 1 {
        vec![run_worker(cache, r, units.iter(), 0, fused, progress, cancel)]
    } else {
        // Static round-robin assignment: worker w takes units w, w+workers, …
        let groups: Vec<Vec<&Vec<u8>>> = (0..workers)
            .map(|w| units.iter().skip(w).step_by(workers).collect())
            .collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CountError::Internal(format!("thread pool construction: {}", e)))?;
        pool.install(|| {
            groups
                .par_iter()
                .enumerate()
                .map(|(worker_id, group)| {
                    run_worker(
                        cache,
                        r,
                        group.iter().copied(),
                        worker_id,
                        fused,
                        progress,
                        cancel,
                    )
                })
                .collect()
        })
    };

    Ok(merge(partials, units_total))
}

/// Fallback partition: every worker runs the whole (optionally
/// first-column-constrained) enumeration but only explores its own
/// round-robin share of row-1 candidates.
pub fn run_row_partitions(
    cache: &DerangementCache,
    r: usize,
    first_column: Option<&[u8]>,
    workers: usize,
    fused: bool,
    progress: &dyn ProgressSink,
    cancel: Option<&CancelToken>,
) -> Result<DriverReport, CountError> {
    debug!(
        r,
        n = cache.n(),
        workers,
        fused,
        "dispatching row-based work partitions"
    );
    let run_one = |worker_id: usize| -> WorkerPartial {
        let mut partial = WorkerPartial::default();
        let mut enumerator = Enumerator::new(cache, r);
        if workers > 1 {
            enumerator.set_row_partition(worker_id, workers);
        }
        if let Some(token) = cancel {
            enumerator.set_cancel(token.clone());
        }
        accumulate_run(&mut enumerator, first_column, fused, &mut partial);
        partial.stats.merge(enumerator.statistics());
        if !partial.cancelled {
            partial.units_done = 1;
            partial.stats.increment(Counters::UnitsCompleted);
            progress.on_unit_complete(
                worker_id,
                1,
                (partial.positive + partial.negative) as u64,
                partial.positive,
                partial.negative,
            );
        }
        partial
    };

    let partials: Vec<WorkerPartial> = if workers <= 1 {
        vec![run_one(0)]
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CountError::Internal(format!("thread pool construction: {}", e)))?;
        pool.install(|| (0..workers).into_par_iter().map(run_one).collect())
    };

    Ok(merge(partials, workers as u64))
}

fn run_worker<'u>(
    cache: &DerangementCache,
    r: usize,
    units: impl Iterator<Item = &'u Vec<u8>>,
    worker_id: usize,
    fused: bool,
    progress: &dyn ProgressSink,
    cancel: Option<&CancelToken>,
) -> WorkerPartial {
    let mut partial = WorkerPartial::default();
    let mut enumerator = Enumerator::new(cache, r);
    if let Some(token) = cancel {
        enumerator.set_cancel(token.clone());
    }

    for unit in units {
        if cancel.is_some_and(|t| t.is_cancelled()) {
            partial.cancelled = true;
            break;
        }
        accumulate_run(&mut enumerator, Some(unit.as_slice()), fused, &mut partial);
        if partial.cancelled {
            break;
        }
        partial.units_done += 1;
        partial.stats.increment(Counters::UnitsCompleted);
        progress.on_unit_complete(
            worker_id,
            partial.units_done,
            (partial.positive + partial.negative) as u64,
            partial.positive,
            partial.negative,
        );
    }
    partial.stats.merge(enumerator.statistics());
    partial
}

/// Run one unit and fold its outcome into the worker accumulators.
fn accumulate_run(
    enumerator: &mut Enumerator<'_>,
    first_column: Option<&[u8]>,
    fused: bool,
    partial: &mut WorkerPartial,
) {
    if fused {
        let outcome = enumerator.run_fused(first_column);
        partial.positive += outcome.base.positive;
        partial.negative += outcome.base.negative;
        partial.fused_positive += outcome.completed.positive;
        partial.fused_negative += outcome.completed.negative;
        partial.cancelled |= outcome.base.cancelled;
    } else {
        let outcome = enumerator.run(first_column);
        partial.positive += outcome.positive;
        partial.negative += outcome.negative;
        partial.cancelled |= outcome.cancelled;
    }
}

fn merge(partials: Vec<WorkerPartial>, units_total: u64) -> DriverReport {
    let mut report = DriverReport {
        units_total,
        ..DriverReport::default()
    };
    for partial in partials {
        report.positive += partial.positive;
        report.negative += partial.negative;
        report.fused_positive += partial.fused_positive;
        report.fused_negative += partial.fused_negative;
        report.units_done += partial.units_done;
        report.cancelled |= partial.cancelled;
        report.stats.merge(&partial.stats);
    }
    report
}
