// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Error surface for the counting API.
//!
//! Cache corruption is deliberately absent here: a corrupt cache file is
//! handled internally by rebuilding (with a warning) and never reaches the
//! caller. Everything else that can go wrong is one of these kinds.

use thiserror::Error;

/// Errors returned by the counting entry points.
#[derive(Debug, Error)]
pub enum CountError {
    /// Dimensions outside the valid domain (r < 2, n < 2, or r > n).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The cache directory is missing or unwritable.
    #[error("cache I/O failure: {0}")]
    CacheIo(#[from] std::io::Error),

    /// n exceeds the implementation cap, or a count would not fit the
    /// configured integer width.
    #[error("dimension too large: {0}")]
    TooLarge(String),

    /// Cooperative cancellation was triggered. Partial counts are raw
    /// per-representative sums; the (r−1)! symmetry factor has *not* been
    /// applied to them.
    #[error("cancelled after {units_done}/{units_total} work units")]
    Cancelled {
        partial_positive: u128,
        partial_negative: u128,
        units_done: u64,
        units_total: u64,
    },

    /// Invariant violation inside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CountError {
    /// Process exit code for the CLI surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            CountError::InvalidInput(_) => 1,
            CountError::Cancelled { .. } => 130,
            _ => 2,
        }
    }
}
