// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Closed-form counting for two-row rectangles.
//!
//! A normalized (2, n) rectangle is the identity over one derangement, so
//! the total is D(n), and the signed difference between even and odd
//! derangements is det(J_n − I_n) = (−1)^(n−1)·(n−1). Solving
//!
//! ```text
//! positive + negative = D(n)
//! positive − negative = (−1)^(n−1)·(n−1)
//! ```
//!
//! gives both counts without enumerating anything.

use crate::perm::derangement_count;

/// Exact (positive, negative, difference) for dimensions (2, n), n ≥ 2.
///
/// Both halves are non-negative for every valid n: D(n) ≥ n−1 and D(n)
/// has the same parity as n−1 (both follow from the recurrence), so the
/// half-sums divide evenly.
pub fn count_two_rows(n: usize) -> (u128, u128, i128) {
    debug_assert!(n >= 2);
    let total = derangement_count(n) as i128;
    let diff: i128 = if n % 2 == 1 {
        n as i128 - 1
    } else {
        1 - n as i128
    };
    let positive = (total + diff) / 2;
    let negative = (total - diff) / 2;
    debug_assert!(positive >= 0 && negative >= 0);
    debug_assert_eq!((total + diff) % 2, 0, "D(n) and n-1 must share parity");
    (positive as u128, negative as u128, diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derange::derangements_with_signs;

    #[test]
    fn test_smallest_cases() {
        // n=2: the single rectangle [1,2]/[2,1] has sign −1.
        assert_eq!(count_two_rows(2), (0, 1, -1));
        // n=3: both derangements are 3-cycles, sign +1.
        assert_eq!(count_two_rows(3), (2, 0, 2));
        // n=4: D(4)=9, diff −3.
        assert_eq!(count_two_rows(4), (3, 6, -3));
        // n=8: D(8)=14833, diff −7.
        assert_eq!(count_two_rows(8), (7413, 7420, -7));
    }

    #[test]
    fn test_matches_explicit_enumeration() {
        for n in 2..=8usize {
            let mut positive = 0u128;
            let mut negative = 0u128;
            for (_, sign) in derangements_with_signs(n) {
                if sign > 0 {
                    positive += 1;
                } else {
                    negative += 1;
                }
            }
            let (p, m, diff) = count_two_rows(n);
            assert_eq!((p, m), (positive, negative), "n={}", n);
            assert_eq!(diff, positive as i128 - negative as i128);
        }
    }
}
