// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Shared helpers for the integration tests.

// Each integration test binary compiles this module independently and not
// all of them use both helpers.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use latin_rectangles::count::Counter;

static UNIQUE: AtomicUsize = AtomicUsize::new(0);

/// A cache directory under the system temp dir, unique per call so tests
/// never race on the same files.
pub fn scratch_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "latin-rectangles-test-{}-{}-{}",
        label,
        std::process::id(),
        UNIQUE.fetch_add(1, Ordering::Relaxed)
    ))
}

/// A counter writing its caches to a scratch directory.
pub fn scratch_counter(label: &str) -> Counter {
    Counter::with_cache_dir(scratch_dir(label))
}
