// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Structural consistency checks: the symmetry reduction against a
//! from-first-principles enumeration, determinism across repeats and the
//! rectangle semantics themselves.

mod common;

use common::scratch_counter;
use latin_rectangles::constraints::BitsetConstraints;
use latin_rectangles::perm;
use latin_rectangles::rectangle::LatinRectangle;

/// Count normalized (r, n) rectangles by brute-force row extension using
/// only the constrained permutation generator — no cache, no masks, no
/// symmetry. Slow but obviously correct.
fn brute_force(r: usize, n: usize) -> (u128, u128) {
    fn extend(
        rows: &mut Vec<Vec<u8>>,
        constraints: &mut BitsetConstraints,
        r: usize,
        positive: &mut u128,
        negative: &mut u128,
    ) {
        if rows.len() == r {
            let rect = LatinRectangle::new(r, rows[0].len(), rows.clone())
                .expect("generator produced an invalid rectangle");
            if rect.sign() > 0 {
                *positive += 1;
            } else {
                *negative += 1;
            }
            return;
        }
        let candidates: Vec<Vec<u8>> = constraints.permutations().collect();
        for row in candidates {
            constraints.add_row(&row);
            rows.push(row);
            extend(rows, constraints, r, positive, negative);
            let row = rows.pop().unwrap();
            constraints.remove_row(&row);
        }
    }

    let identity: Vec<u8> = (1..=n as u8).collect();
    let mut constraints = BitsetConstraints::new(n);
    constraints.add_row(&identity);
    let mut rows = vec![identity];
    let mut positive = 0;
    let mut negative = 0;
    extend(&mut rows, &mut constraints, r, &mut positive, &mut negative);
    (positive, negative)
}

#[test]
fn test_engine_matches_brute_force() {
    let counter = scratch_counter("brute");
    for n in 3..=5usize {
        for r in 2..=n {
            let (positive, negative) = brute_force(r, n);
            let result = counter.count(r, n).unwrap();
            assert_eq!(
                (result.positive, result.negative),
                (positive, negative),
                "(r,n)=({},{})",
                r,
                n
            );
        }
    }
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let counter = scratch_counter("determinism");
    let first = counter.count(4, 6).unwrap();
    for _ in 0..3 {
        let again = counter.count(4, 6).unwrap();
        assert_eq!(again.positive, first.positive);
        assert_eq!(again.negative, first.negative);
    }
}

#[test]
fn test_first_column_consistency_wider() {
    // The reducer (the only path the dispatcher uses for r >= 3) must
    // agree with brute force on a dimension with many first-column units.
    let counter = scratch_counter("reducer");
    let (positive, negative) = brute_force(3, 6);
    let result = counter.count(3, 6).unwrap();
    assert_eq!((result.positive, result.negative), (positive, negative));
}

#[test]
fn test_first_column_consistency_n7() {
    let counter = scratch_counter("reducer7");
    let (positive, negative) = brute_force(3, 7);
    let result = counter.count(3, 7).unwrap();
    assert_eq!((result.positive, result.negative), (positive, negative));
}

#[test]
fn test_difference_field_consistency() {
    let counter = scratch_counter("difference");
    for n in 2..=6usize {
        for r in 2..=n {
            let result = counter.count(r, n).unwrap();
            assert_eq!(
                result.difference,
                result.positive as i128 - result.negative as i128
            );
        }
    }
}

#[test]
fn test_permutation_sign_parity_vs_determinant() {
    // Re-run of the core parity property at the integration level, over
    // every permutation of up to six elements.
    fn visit(perm_buf: &mut Vec<u8>, start: usize, check: &mut impl FnMut(&[u8])) {
        if start == perm_buf.len() {
            check(perm_buf);
            return;
        }
        for i in start..perm_buf.len() {
            perm_buf.swap(start, i);
            visit(perm_buf, start + 1, check);
            perm_buf.swap(start, i);
        }
    }
    for n in 1..=6usize {
        let mut buf: Vec<u8> = (1..=n as u8).collect();
        visit(&mut buf, 0, &mut |p| {
            let mut matrix = vec![vec![0i64; n]; n];
            for (col, &v) in p.iter().enumerate() {
                matrix[v as usize - 1][col] = 1;
            }
            assert_eq!(
                perm::determinant(&matrix) as i8,
                perm::sign(p),
                "permutation {:?}",
                p
            );
        });
    }
}
