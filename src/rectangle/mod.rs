// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Latin rectangle value type with validation.
//!
//! The counting engine never materializes rectangles — it works on
//! derangement indices and masks — so this type exists for the edges of
//! the system: validating externally supplied data and cross-checking the
//! engine's semantics in tests.

use std::fmt;

use crate::perm;

/// Reasons a grid fails to be a Latin rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RectangleError {
    InvalidDimensions { r: usize, n: usize },
    WrongShape { rows: usize, expected_rows: usize },
    RowNotPermutation { row: usize },
    ColumnConflict { column: usize, row_a: usize, row_b: usize },
}

impl fmt::Display for RectangleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RectangleError::InvalidDimensions { r, n } => write!(
                f,
                "dimensions must satisfy 2 <= r <= n, got r={}, n={}",
                r, n
            ),
            RectangleError::WrongShape {
                rows,
                expected_rows,
            } => write!(f, "expected {} rows, got {}", expected_rows, rows),
            RectangleError::RowNotPermutation { row } => {
                write!(f, "row {} is not a permutation", row)
            }
            RectangleError::ColumnConflict {
                column,
                row_a,
                row_b,
            } => write!(
                f,
                "rows {} and {} repeat a value in column {}",
                row_a, row_b, column
            ),
        }
    }
}

impl std::error::Error for RectangleError {}

/// A validated r×n Latin rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatinRectangle {
    r: usize,
    n: usize,
    rows: Vec<Vec<u8>>,
}

impl LatinRectangle {
    /// Validate a grid: 2 ≤ r ≤ n, r rows, each a permutation of `1..=n`,
    /// no value repeated within a column.
    pub fn new(r: usize, n: usize, rows: Vec<Vec<u8>>) -> Result<Self, RectangleError> {
        if r < 2 || r > n {
            return Err(RectangleError::InvalidDimensions { r, n });
        }
        if rows.len() != r {
            return Err(RectangleError::WrongShape {
                rows: rows.len(),
                expected_rows: r,
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n || !perm::is_permutation(row) {
                return Err(RectangleError::RowNotPermutation { row: i });
            }
        }
        for column in 0..n {
            for a in 0..r {
                for b in a + 1..r {
                    if rows[a][column] == rows[b][column] {
                        return Err(RectangleError::ColumnConflict {
                            column,
                            row_a: a,
                            row_b: b,
                        });
                    }
                }
            }
        }
        Ok(Self { r, n, rows })
    }

    #[inline]
    pub fn r(&self) -> usize {
        self.r
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// True when row 0 is the identity. Rows 1.. are then necessarily
    /// derangements, by the column constraint.
    pub fn is_normalized(&self) -> bool {
        self.rows[0]
            .iter()
            .enumerate()
            .all(|(i, &v)| v as usize == i + 1)
    }

    /// Product of the signs of all rows.
    pub fn sign(&self) -> i8 {
        self.rows.iter().map(|row| perm::sign(row)).product()
    }
}
