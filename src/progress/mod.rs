// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Progress reporting interface.
//!
//! The core calls a sink at coarse points only: once per run start, once
//! per completed work unit, once per finished result. Calls are
//! fire-and-forget; updates from concurrent workers arrive unordered, and
//! an implementation is free to drop them. Nothing in the core buffers or
//! retries, and no counting behavior may depend on the sink.

use tracing::debug;

use crate::count::CountResult;

/// Receiver of best-effort progress events.
///
/// Implementations must be non-blocking (or near enough); workers call
/// [`on_unit_complete`](ProgressSink::on_unit_complete) from the hot
/// fork-join path.
pub trait ProgressSink: Send + Sync {
    /// A computation for (r, n) is starting with the given number of work
    /// units.
    fn on_start(&self, r: usize, n: usize, total_work_units: u64) {
        let _ = (r, n, total_work_units);
    }

    /// A worker finished one work unit. `units_done` and
    /// `rectangles_scanned` are cumulative for that worker; the partial
    /// counts are its raw (unscaled) accumulators.
    fn on_unit_complete(
        &self,
        worker_id: usize,
        units_done: u64,
        rectangles_scanned: u64,
        partial_positive: u128,
        partial_negative: u128,
    ) {
        let _ = (
            worker_id,
            units_done,
            rectangles_scanned,
            partial_positive,
            partial_negative,
        );
    }

    /// The computation finished with this result.
    fn on_finish(&self, result: &CountResult) {
        let _ = result;
    }
}

/// Sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Sink that forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_start(&self, r: usize, n: usize, total_work_units: u64) {
        debug!(r, n, total_work_units, "count started");
    }

    fn on_unit_complete(
        &self,
        worker_id: usize,
        units_done: u64,
        rectangles_scanned: u64,
        partial_positive: u128,
        partial_negative: u128,
    ) {
        debug!(
            worker_id,
            units_done,
            rectangles_scanned,
            partial_positive = %partial_positive,
            partial_negative = %partial_negative,
            "work unit complete"
        );
    }

    fn on_finish(&self, result: &CountResult) {
        debug!(
            r = result.r,
            n = result.n,
            positive = %result.positive,
            negative = %result.negative,
            "count finished"
        );
    }
}
