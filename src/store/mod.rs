// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Result store interface.
//!
//! Finished counts can be persisted in any key-value store keyed by
//! (r, n); the core treats the store as opaque and guarantees bit-exact
//! identical counts whether or not a store is consulted. The only
//! implementation shipped here keeps results in memory; anything heavier
//! lives outside the core.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::count::CountResult;

/// Key-value persistence for finished counts.
pub trait ResultStore: Send + Sync {
    /// Previously stored result for (r, n), if any.
    fn lookup(&self, r: usize, n: usize) -> Option<CountResult>;

    /// Persist a result. Implementations may overwrite.
    fn store(&self, result: &CountResult);
}

/// In-memory result store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    results: Mutex<HashMap<(usize, usize), CountResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryStore {
    fn lookup(&self, r: usize, n: usize) -> Option<CountResult> {
        self.results.lock().unwrap().get(&(r, n)).cloned()
    }

    fn store(&self, result: &CountResult) {
        self.results
            .lock()
            .unwrap()
            .insert((result.r, result.n), result.clone());
    }
}
