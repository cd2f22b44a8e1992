// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Binary derangement cache.
//!
//! For a given n this holds every derangement of `1..=n` in lexicographic
//! order, its sign, and a position-value index: for each (position p, value
//! v) a bitmask over derangement indices marking exactly those derangements
//! with value v at position p.
//!
//! That one index serves two roles. Read negatively it is a *conflict
//! mask*: once value v occupies column p, every derangement in
//! `pv_mask(p, v)` is excluded for later rows. Read positively it is a
//! *prefix filter*: the candidates whose first value is a₁ are
//! `pv_mask(0, a₁)`, and intersecting with `pv_mask(1, a₂)` narrows to a
//! two-value prefix in O(count/64) words.
//!
//! # Lifecycle
//!
//! A cache is built on demand, written atomically (temp file + rename) to
//! `smart_derangements_n{n}.bin` in the configured directory, and from then
//! on loaded read-only. A file that fails validation in any way is rebuilt
//! in place with a warning; missing directories and other I/O failures
//! propagate. After a successful load the instance is immutable and shared
//! between workers behind an `Arc`.
//!
//! # Memory layout
//!
//! Rows are one contiguous byte arena (count × n), signs another, and all
//! n² masks live in a single `u64` arena with a fixed stride, so the
//! enumerator's inner loop walks machine words without pointer chasing.

pub mod format;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::derange;
use crate::error::CountError;
use crate::perm::{self, MAX_N};

pub use format::FormatError;

/// Immutable derangement table with signs and the position-value index.
#[derive(Debug)]
pub struct DerangementCache {
    n: usize,
    count: usize,
    words_per_mask: usize,
    /// count × n cell bytes, row-major.
    rows: Box<[u8]>,
    /// count signs, ±1.
    signs: Box<[i8]>,
    /// n × n bitmasks of `words_per_mask` words, (position, value) row-major.
    pv_masks: Box<[u64]>,
    /// Indices of derangements with sign +1 (derived at load, not stored).
    positive_mask: Box<[u64]>,
    /// Indices of derangements with sign −1.
    negative_mask: Box<[u64]>,
}

/// Distribution summary of a cache, for logging and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub n: usize,
    pub count: usize,
    pub positive: u64,
    pub negative: u64,
    /// How many derangements start with each value 2..=n.
    pub first_value_counts: Vec<(u8, u64)>,
}

impl DerangementCache {
    /// Load the cache for `n` from `cache_dir`, rebuilding on any
    /// validation failure, or build and persist it if absent.
    pub fn load_or_build(n: usize, cache_dir: &Path) -> Result<Self, CountError> {
        if n < 2 {
            return Err(CountError::InvalidInput(format!(
                "derangement cache requires n >= 2, got n={}",
                n
            )));
        }
        if n > MAX_N {
            return Err(CountError::TooLarge(format!(
                "n={} exceeds the cap of {} (the position-value index would not fit in memory)",
                n, MAX_N
            )));
        }

        let path = Self::file_path(n, cache_dir);
        match fs::read(&path) {
            Ok(bytes) => {
                let expected_count = perm::derangement_count(n) as usize;
                match format::decode(&bytes, n, expected_count) {
                    Ok(sections) => {
                        debug!(n, count = sections.count, path = %path.display(), "loaded derangement cache");
                        return Ok(Self::from_sections(sections));
                    }
                    Err(err) => {
                        warn!(n, path = %path.display(), %err, "derangement cache corrupt, rebuilding");
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(CountError::CacheIo(err)),
        }

        let cache = Self::build(n);
        cache.persist(&path)?;
        Ok(cache)
    }

    /// Cache file path for dimension `n` under `cache_dir`.
    pub fn file_path(n: usize, cache_dir: &Path) -> PathBuf {
        cache_dir.join(format!("smart_derangements_n{}.bin", n))
    }

    /// Build the cache for `n` in memory.
    pub fn build(n: usize) -> Self {
        debug!(n, "building derangement cache");
        let with_signs = derange::derangements_with_signs(n);
        let count = with_signs.len();
        debug_assert_eq!(count as u128, perm::derangement_count(n));

        let words_per_mask = count.div_ceil(64).max(1);
        let mut rows = vec![0u8; count * n];
        let mut signs = vec![0i8; count];
        let mut pv_masks = vec![0u64; n * n * words_per_mask];
        let mut positive_mask = vec![0u64; words_per_mask];
        let mut negative_mask = vec![0u64; words_per_mask];

        for (idx, (row, sign)) in with_signs.iter().enumerate() {
            rows[idx * n..(idx + 1) * n].copy_from_slice(row);
            signs[idx] = *sign;
            let word = idx / 64;
            let bit = 1u64 << (idx % 64);
            for (pos, &value) in row.iter().enumerate() {
                pv_masks[(pos * n + value as usize - 1) * words_per_mask + word] |= bit;
            }
            if *sign > 0 {
                positive_mask[word] |= bit;
            } else {
                negative_mask[word] |= bit;
            }
        }

        Self {
            n,
            count,
            words_per_mask,
            rows: rows.into_boxed_slice(),
            signs: signs.into_boxed_slice(),
            pv_masks: pv_masks.into_boxed_slice(),
            positive_mask: positive_mask.into_boxed_slice(),
            negative_mask: negative_mask.into_boxed_slice(),
        }
    }

    fn from_sections(sections: format::RawSections) -> Self {
        let n = sections.n;
        let count = sections.count;
        let words_per_mask = count.div_ceil(64).max(1);
        let mask_bytes = format::mask_bytes(count);

        let mut pv_masks = vec![0u64; n * n * words_per_mask];
        for mask_idx in 0..n * n {
            let src = &sections.pv_index[mask_idx * mask_bytes..(mask_idx + 1) * mask_bytes];
            let dst = &mut pv_masks[mask_idx * words_per_mask..(mask_idx + 1) * words_per_mask];
            for (byte_idx, &b) in src.iter().enumerate() {
                dst[byte_idx / 8] |= (b as u64) << ((byte_idx % 8) * 8);
            }
        }

        let mut positive_mask = vec![0u64; words_per_mask];
        let mut negative_mask = vec![0u64; words_per_mask];
        for (idx, &sign) in sections.signs.iter().enumerate() {
            let bit = 1u64 << (idx % 64);
            if sign > 0 {
                positive_mask[idx / 64] |= bit;
            } else {
                negative_mask[idx / 64] |= bit;
            }
        }

        Self {
            n,
            count,
            words_per_mask,
            rows: sections.rows.into_boxed_slice(),
            signs: sections.signs.into_boxed_slice(),
            pv_masks: pv_masks.into_boxed_slice(),
            positive_mask: positive_mask.into_boxed_slice(),
            negative_mask: negative_mask.into_boxed_slice(),
        }
    }

    /// Write this cache to `path` atomically (temp file in the same
    /// directory, then rename).
    pub fn persist(&self, path: &Path) -> Result<(), CountError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = self.to_file_bytes();
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        debug!(n = self.n, bytes = bytes.len(), path = %path.display(), "persisted derangement cache");
        Ok(())
    }

    /// Serialize to the on-disk representation (see [`format`]).
    pub fn to_file_bytes(&self) -> Vec<u8> {
        let mask_bytes = format::mask_bytes(self.count);
        let mut pv_index = vec![0u8; self.n * self.n * mask_bytes];
        for mask_idx in 0..self.n * self.n {
            let src = &self.pv_masks
                [mask_idx * self.words_per_mask..(mask_idx + 1) * self.words_per_mask];
            let dst = &mut pv_index[mask_idx * mask_bytes..(mask_idx + 1) * mask_bytes];
            for (byte_idx, byte) in dst.iter_mut().enumerate() {
                *byte = (src[byte_idx / 8] >> ((byte_idx % 8) * 8)) as u8;
            }
        }
        format::encode(self.n, self.count, &self.rows, &self.signs, &pv_index)
    }

    /// Dimension n.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of derangements, D(n).
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Words per index bitmask.
    #[inline]
    pub fn words_per_mask(&self) -> usize {
        self.words_per_mask
    }

    /// The i-th derangement row (lexicographic index).
    #[inline]
    pub fn row(&self, i: usize) -> &[u8] {
        &self.rows[i * self.n..(i + 1) * self.n]
    }

    /// Sign of the i-th derangement.
    #[inline]
    pub fn sign(&self, i: usize) -> i8 {
        self.signs[i]
    }

    /// The i-th derangement with its sign.
    #[inline]
    pub fn derangement(&self, i: usize) -> (&[u8], i8) {
        (self.row(i), self.signs[i])
    }

    /// Bitmask of derangement indices with `value` at position `pos`.
    ///
    /// This is simultaneously the conflict mask for "value already used in
    /// column pos" and the prefix filter for "row must start (or continue)
    /// with value at pos".
    #[inline]
    pub fn pv_mask(&self, pos: usize, value: u8) -> &[u64] {
        let base = (pos * self.n + value as usize - 1) * self.words_per_mask;
        &self.pv_masks[base..base + self.words_per_mask]
    }

    /// Bitmask of indices whose derangement has sign +1.
    #[inline]
    pub fn positive_mask(&self) -> &[u64] {
        &self.positive_mask
    }

    /// Bitmask of indices whose derangement has sign −1.
    #[inline]
    pub fn negative_mask(&self) -> &[u64] {
        &self.negative_mask
    }

    /// Indices of derangements whose first `prefix.len()` values equal
    /// `prefix`, ascending.
    ///
    /// Narrowing is pure mask intersection: one mask read for a single
    /// value, two for a pair, and one further intersection per additional
    /// prefix position.
    pub fn compatible_with(&self, prefix: &[u8]) -> impl Iterator<Item = usize> {
        let mut words: Vec<u64> = match prefix.first() {
            Some(&v0) => self.pv_mask(0, v0).to_vec(),
            None => {
                let mut all = vec![u64::MAX; self.words_per_mask];
                clamp_to_bits(&mut all, self.count);
                all
            }
        };
        for (pos, &value) in prefix.iter().enumerate().skip(1) {
            for (w, &m) in words.iter_mut().zip(self.pv_mask(pos, value)) {
                *w &= m;
            }
        }
        SetBits { words, next: 0 }
    }

    /// Sign and first-value distribution.
    pub fn stats(&self) -> CacheStats {
        let positive: u64 = self.positive_mask.iter().map(|w| w.count_ones() as u64).sum();
        let first_value_counts = (2..=self.n as u8)
            .map(|v| {
                let ones: u64 = self.pv_mask(0, v).iter().map(|w| w.count_ones() as u64).sum();
                (v, ones)
            })
            .collect();
        CacheStats {
            n: self.n,
            count: self.count,
            positive,
            negative: self.count as u64 - positive,
            first_value_counts,
        }
    }
}

/// Zero every bit at or above `bits` in a word buffer.
fn clamp_to_bits(words: &mut [u64], bits: usize) {
    let full_words = bits / 64;
    if full_words < words.len() {
        let rem = bits % 64;
        words[full_words] = if rem == 0 { 0 } else { words[full_words] & ((1u64 << rem) - 1) };
        for w in &mut words[full_words + 1..] {
            *w = 0;
        }
    }
}

/// Iterator over set bit positions of an owned word buffer, ascending.
struct SetBits {
    words: Vec<u64>,
    next: usize,
}

impl Iterator for SetBits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.next < self.words.len() {
            let w = self.words[self.next];
            if w != 0 {
                let bit = w.trailing_zeros() as usize;
                self.words[self.next] &= w - 1;
                return Some(self.next * 64 + bit);
            }
            self.next += 1;
        }
        None
    }
}
