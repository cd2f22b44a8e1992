// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Row-by-row backtracking enumerator over derangement indices.
//!
//! # Algorithm
//!
//! Rows 1..r−1 of the rectangle are chosen from the derangement cache. The
//! enumerator maintains one "free" mask per depth: `free[k]` marks the
//! derangement indices that conflict with none of rows 0..k−1. Placing row
//! k at index i refines it in one sweep,
//!
//! ```text
//! free[k+1] = free[k] ∧ ¬( ∪_pos pv_mask(pos, row_i[pos]) )
//! ```
//!
//! and backtracking is free: `free[k]` is simply still there.
//!
//! Candidates at depth k are `free[k]`, optionally intersected with the
//! prefix filter `pv_mask(0, fc[k])` when a first column is fixed. Set
//! bits are visited in ascending order, which is lexicographic order of
//! derangement indices — the traversal order is part of the contract, so
//! repeated runs visit rectangles identically.
//!
//! At the last row no individual candidates are visited at all: the
//! candidate mask is popcounted against the cache's sign-partitioned masks,
//! so a whole family of rectangles is counted per popcount. In fused mode
//! (counting (n−1, n) and (n, n) together) the last row *is* iterated,
//! because each rectangle's unique completion row — the single bit
//! remaining in the next free mask — must be read off individually.
//!
//! # Memory discipline
//!
//! All r+1 masks are allocated at construction and rewritten in place;
//! nothing allocates inside the row loops. A worker constructs one
//! enumerator and reuses it across its work units.

use crate::cache::DerangementCache;
use crate::count::mask::IndexMask;
use crate::count::parallel::CancelToken;
use crate::count::statistics::{Counters, Statistics};

/// Signed counts from one enumeration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub positive: u128,
    pub negative: u128,
    /// True if the run stopped early at a cancellation point; counts are
    /// then partial.
    pub cancelled: bool,
}

impl Outcome {
    /// Rectangles visited by this run.
    pub fn total(&self) -> u128 {
        self.positive + self.negative
    }
}

/// Outcome of a fused run: the (r, n) counts and the (r+1, n) counts
/// obtained from the forced completions, in one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FusedOutcome {
    pub base: Outcome,
    pub completed: Outcome,
}

/// Backtracking enumerator for r ≥ 3 over a shared derangement cache.
pub struct Enumerator<'a> {
    cache: &'a DerangementCache,
    r: usize,
    n: usize,
    /// free[k] is valid before placing row k; entry 0 is unused, entry r
    /// exists for completion masks in fused mode.
    free: Vec<IndexMask>,
    first_column: Option<Vec<u8>>,
    /// Round-robin filter over row-1 candidates: only candidates with
    /// ordinal ≡ offset (mod stride) are explored.
    row_partition: Option<(usize, usize)>,
    cancel: Option<CancelToken>,
    stats: Statistics,
    positive: u128,
    negative: u128,
    fused_positive: u128,
    fused_negative: u128,
    cancelled: bool,
}

impl<'a> Enumerator<'a> {
    /// Create an enumerator for r-row rectangles over `cache`.
    ///
    /// # Panics
    ///
    /// Panics unless 3 ≤ r ≤ n; two-row counting has a closed form and
    /// never constructs an enumerator.
    pub fn new(cache: &'a DerangementCache, r: usize) -> Self {
        let n = cache.n();
        assert!((3..=n).contains(&r), "enumerator requires 3 <= r <= n");
        let free = (0..=r).map(|_| IndexMask::zeroes(cache.count())).collect();
        Self {
            cache,
            r,
            n,
            free,
            first_column: None,
            row_partition: None,
            cancel: None,
            stats: Statistics::new(),
            positive: 0,
            negative: 0,
            fused_positive: 0,
            fused_negative: 0,
            cancelled: false,
        }
    }

    /// Install a cancellation token, checked between row-1 choices.
    pub fn set_cancel(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    /// Restrict row-1 candidates to ordinals ≡ offset (mod stride).
    ///
    /// This is the row-based work partition used when first-column
    /// reduction yields too few units to spread across workers.
    pub fn set_row_partition(&mut self, offset: usize, stride: usize) {
        assert!(stride > 0 && offset < stride);
        self.row_partition = Some((offset, stride));
    }

    /// Cumulative statistics across all runs of this enumerator.
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Count rectangles, optionally under a fixed first column
    /// `[1, a_1, …, a_{r−1}]` (`fc[k]` is the value in column 0 of row k).
    pub fn run(&mut self, first_column: Option<&[u8]>) -> Outcome {
        self.prepare(first_column);
        self.descend(1, 1, false);
        Outcome {
            positive: self.positive,
            negative: self.negative,
            cancelled: self.cancelled,
        }
    }

    /// Count (r, n) rectangles and their unique (r+1, n) completions in a
    /// single sweep. Requires r = n − 1 (only then is the completion row
    /// forced).
    pub fn run_fused(&mut self, first_column: Option<&[u8]>) -> FusedOutcome {
        assert_eq!(
            self.r,
            self.n - 1,
            "completion fusion requires r = n - 1"
        );
        self.prepare(first_column);
        self.descend(1, 1, true);
        FusedOutcome {
            base: Outcome {
                positive: self.positive,
                negative: self.negative,
                cancelled: self.cancelled,
            },
            completed: Outcome {
                positive: self.fused_positive,
                negative: self.fused_negative,
                cancelled: self.cancelled,
            },
        }
    }

    fn prepare(&mut self, first_column: Option<&[u8]>) {
        if let Some(fc) = first_column {
            debug_assert_eq!(fc.len(), self.r, "first column must have r entries");
            debug_assert_eq!(fc[0], 1, "normalized first column starts with 1");
            debug_assert!(
                fc[1..].windows(2).all(|w| w[0] < w[1]),
                "canonical first column is strictly ascending"
            );
            self.first_column = Some(fc.to_vec());
        } else {
            self.first_column = None;
        }
        self.positive = 0;
        self.negative = 0;
        self.fused_positive = 0;
        self.fused_negative = 0;
        self.cancelled = false;
        self.free[1].set_all();
    }

    /// Prefix filter for row `depth`, if a first column is fixed.
    #[inline]
    fn filter_for(&self, depth: usize) -> Option<&'a [u64]> {
        let value = self.first_column.as_ref().map(|fc| fc[depth])?;
        Some(self.cache.pv_mask(0, value))
    }

    /// Recurse over rows `depth..r-1`, with `sign` the product of the signs
    /// of rows 0..depth−1.
    fn descend(&mut self, depth: usize, sign: i8, fused: bool) {
        if depth == self.r - 1 {
            if fused {
                self.last_row_fused(sign);
            } else {
                self.last_row_popcount(depth, sign);
            }
            return;
        }

        let cache = self.cache;
        let filter = self.filter_for(depth);
        let nwords = cache.words_per_mask();
        let mut ordinal = 0usize;

        for wi in 0..nwords {
            let mut w = self.free[depth].words()[wi];
            if let Some(f) = filter {
                w &= f[wi];
            }
            while w != 0 {
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                let idx = wi * 64 + bit;

                if depth == 1 {
                    if let Some((offset, stride)) = self.row_partition {
                        let mine = ordinal % stride == offset;
                        ordinal += 1;
                        if !mine {
                            continue;
                        }
                    }
                    if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                        self.cancelled = true;
                        return;
                    }
                }

                let row = cache.row(idx);
                let (head, tail) = self.free.split_at_mut(depth + 1);
                tail[0].assign_and_not_conflicts(
                    &head[depth],
                    |pos| cache.pv_mask(pos, row[pos]),
                    self.n,
                );
                if tail[0].is_zero() {
                    self.stats.increment(Counters::DeadEnds);
                    continue;
                }
                self.descend(depth + 1, sign * cache.sign(idx), fused);
                if self.cancelled {
                    return;
                }
            }
        }
    }

    /// Count every completion of the last row at once: the candidate mask
    /// popcounted against the sign-partitioned index masks.
    fn last_row_popcount(&mut self, depth: usize, sign: i8) {
        let cache = self.cache;
        let free = &self.free[depth];
        let (with_plus, with_minus) = match self.filter_for(depth) {
            Some(f) => (
                free.popcount_and2(f, cache.positive_mask()),
                free.popcount_and2(f, cache.negative_mask()),
            ),
            None => (
                free.popcount_and(cache.positive_mask()),
                free.popcount_and(cache.negative_mask()),
            ),
        };
        self.stats.add(Counters::Rectangles, with_plus + with_minus);
        if sign > 0 {
            self.positive += with_plus as u128;
            self.negative += with_minus as u128;
        } else {
            self.positive += with_minus as u128;
            self.negative += with_plus as u128;
        }
    }

    /// Fused last row: visit each candidate, count the (r, n) rectangle,
    /// then read off its forced (r+1, n) completion from the next free
    /// mask. For a complete rectangle with r = n−1 that mask has exactly
    /// one bit set.
    fn last_row_fused(&mut self, sign: i8) {
        let cache = self.cache;
        let depth = self.r - 1;
        let filter = self.filter_for(depth);
        let nwords = cache.words_per_mask();

        for wi in 0..nwords {
            let mut w = self.free[depth].words()[wi];
            if let Some(f) = filter {
                w &= f[wi];
            }
            while w != 0 {
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                let idx = wi * 64 + bit;

                let rect_sign = sign * cache.sign(idx);
                self.stats.increment(Counters::Rectangles);
                if rect_sign > 0 {
                    self.positive += 1;
                } else {
                    self.negative += 1;
                }

                let row = cache.row(idx);
                let (head, tail) = self.free.split_at_mut(self.r);
                tail[0].assign_and_not_conflicts(
                    &head[depth],
                    |pos| cache.pv_mask(pos, row[pos]),
                    self.n,
                );
                let completion = &tail[0];
                debug_assert_eq!(
                    completion.count_ones(),
                    1,
                    "an (n-1, n) rectangle has exactly one completion row"
                );
                for (cwi, &cword) in completion.words().iter().enumerate() {
                    let mut cw = cword;
                    while cw != 0 {
                        let cbit = cw.trailing_zeros() as usize;
                        cw &= cw - 1;
                        let cidx = cwi * 64 + cbit;
                        if rect_sign * cache.sign(cidx) > 0 {
                            self.fused_positive += 1;
                        } else {
                            self.fused_negative += 1;
                        }
                    }
                }
            }
        }
    }
}
