// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! End-to-end scenarios with literal expected counts.
//!
//! The small dimensions run on every test invocation. The two n=8
//! heavyweights are marked `#[ignore]`; run them with
//! `cargo test --release -- --ignored` when you have a few minutes.

mod common;

use common::scratch_counter;
use latin_rectangles::count::{CountOptions, Mode};

fn assert_counts(r: usize, n: usize, positive: u128, negative: u128, difference: i128) {
    let counter = scratch_counter("counts");
    let result = counter.count(r, n).unwrap();
    assert_eq!(result.positive, positive, "({}, {}) positive", r, n);
    assert_eq!(result.negative, negative, "({}, {}) negative", r, n);
    assert_eq!(result.difference, difference, "({}, {}) difference", r, n);
    assert_eq!(result.difference, result.positive as i128 - result.negative as i128);
}

#[test]
fn test_two_by_three() {
    // D(3) = 2 and det(J − I) = +2: both derangements of three elements
    // are even 3-cycles.
    assert_counts(2, 3, 2, 0, 2);
}

#[test]
fn test_two_by_four() {
    assert_counts(2, 4, 3, 6, -3);
}

#[test]
fn test_three_by_four() {
    assert_counts(3, 4, 12, 12, 0);
}

#[test]
fn test_four_by_four() {
    assert_counts(4, 4, 24, 0, 24);
}

#[test]
fn test_five_by_five() {
    assert_counts(5, 5, 384, 960, -576);
}

#[test]
fn test_six_by_six() {
    assert_counts(6, 6, 426_240, 702_720, -276_480);
}

#[test]
fn test_two_by_eight() {
    assert_counts(2, 8, 7_413, 7_420, -7);
}

#[test]
#[ignore = "minutes of work; run with --release -- --ignored"]
fn test_three_by_eight() {
    assert_counts(3, 8, 35_133_504, 35_165_760, -32_256);
}

#[test]
#[ignore = "heavy; run with --release -- --ignored"]
fn test_four_by_eight() {
    assert_counts(4, 8, 44_196_405_120, 44_194_590_720, 1_814_400);
}

#[test]
fn test_r2_closed_form_across_n() {
    // difference = (−1)^(n−1) · (n−1) and the halves sum to D(n).
    let counter = scratch_counter("r2");
    let expected_totals: [u128; 7] = [1, 2, 9, 44, 265, 1854, 14833];
    for (i, &total) in expected_totals.iter().enumerate() {
        let n = i + 2;
        let result = counter.count(2, n).unwrap();
        let expected_diff = if n % 2 == 1 {
            n as i128 - 1
        } else {
            1 - n as i128
        };
        assert_eq!(result.total(), total, "n={}", n);
        assert_eq!(result.difference, expected_diff, "n={}", n);
    }
}

#[test]
fn test_divisibility_by_row_symmetry_factor() {
    // Both signed counts are exact multiples of (r−1)!.
    let counter = scratch_counter("divisibility");
    for n in 3..=6usize {
        for r in 3..=n {
            let factor = latin_rectangles::perm::factorial(r - 1);
            let result = counter.count(r, n).unwrap();
            assert_eq!(result.positive % factor, 0, "(r,n)=({},{})", r, n);
            assert_eq!(result.negative % factor, 0, "(r,n)=({},{})", r, n);
        }
    }
}

#[test]
fn test_completion_identity_totals() {
    // count(n−1, n) and count(n, n) agree in total for every n; the
    // per-sign split matches for odd n and differs for even n by the
    // forced completion's sign.
    let counter = scratch_counter("completion");
    for n in 3..=6usize {
        let shallow = counter.count(n - 1, n).unwrap();
        let square = counter.count(n, n).unwrap();
        assert_eq!(shallow.total(), square.total(), "n={}", n);
        if n % 2 == 1 {
            assert_eq!(shallow.positive, square.positive, "n={}", n);
            assert_eq!(shallow.negative, square.negative, "n={}", n);
        }
    }
}

#[test]
fn test_fused_path_equals_separate_counts() {
    let counter = scratch_counter("fused");
    for n in 4..=6usize {
        let (base, completed) = counter
            .count_with_completion(n - 1, n, &CountOptions::default(), None)
            .unwrap();
        let separate_base = counter.count(n - 1, n).unwrap();
        let separate_full = counter.count(n, n).unwrap();
        assert_eq!(base.positive, separate_base.positive, "n={}", n);
        assert_eq!(base.negative, separate_base.negative, "n={}", n);
        assert_eq!(completed.positive, separate_full.positive, "n={}", n);
        assert_eq!(completed.negative, separate_full.negative, "n={}", n);
    }
}

#[test]
fn test_count_range_covers_expected_dimensions() {
    let counter = scratch_counter("range");
    let results = counter
        .count_range(2..=6, 2..=5, &CountOptions::default())
        .unwrap();
    let dims: Vec<(usize, usize)> = results.iter().map(|c| (c.r, c.n)).collect();
    assert_eq!(
        dims,
        vec![
            (2, 2),
            (2, 3),
            (3, 3),
            (2, 4),
            (3, 4),
            (4, 4),
            (2, 5),
            (3, 5),
            (4, 5),
            (5, 5),
        ]
    );
    // Spot checks inside the range.
    assert_eq!(results[4].total(), 24); // (3, 4)
    assert_eq!(results[9].positive, 384); // (5, 5)
}

#[test]
fn test_invalid_dimensions_rejected() {
    let counter = scratch_counter("invalid");
    assert!(counter.count(1, 5).is_err());
    assert!(counter.count(2, 1).is_err());
    assert!(counter.count(6, 5).is_err());
}

#[test]
fn test_single_and_parallel_modes_agree() {
    let counter = scratch_counter("modes");
    let single = counter
        .count_with_options(
            5,
            6,
            &CountOptions {
                mode: Mode::Single,
                ..CountOptions::default()
            },
            None,
        )
        .unwrap();
    for workers in [1usize, 2, 4, 8] {
        let parallel = counter
            .count_with_options(
                5,
                6,
                &CountOptions {
                    mode: Mode::Parallel,
                    workers: Some(workers),
                    ..CountOptions::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(parallel.positive, single.positive, "workers={}", workers);
        assert_eq!(parallel.negative, single.negative, "workers={}", workers);
    }
}
