// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Derangement generation.
//!
//! A derangement here is a permutation of `1..=n` with no column equal to
//! its identity value, i.e. the candidate second row of a normalized Latin
//! rectangle. Generation goes through the constrained permutation
//! enumerator with `forbidden[i] = {i+1}`, which yields derangements
//! directly in lexicographic order — the order the derangement cache
//! assigns indices in, so it must never change.

use crate::constraints::{BitsetConstraints, ConstrainedPermutations};
use crate::perm;

/// Iterator over all derangements of `1..=n` in lexicographic order.
pub struct Derangements {
    inner: ConstrainedPermutations,
}

impl Derangements {
    /// Enumerate derangements of `1..=n`.
    pub fn new(n: usize) -> Self {
        let mut constraints = BitsetConstraints::new(n);
        let identity: Vec<u8> = (1..=n as u8).collect();
        constraints.add_row(&identity);
        Self {
            inner: constraints.permutations(),
        }
    }
}

impl Iterator for Derangements {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        self.inner.next()
    }
}

/// All derangements of `1..=n` with their signs, in lexicographic order.
///
/// This is the raw material of the derangement cache: row i of the cache is
/// element i of this list.
pub fn derangements_with_signs(n: usize) -> Vec<(Vec<u8>, i8)> {
    Derangements::new(n)
        .map(|d| {
            let sign = perm::sign(&d);
            (d, sign)
        })
        .collect()
}
