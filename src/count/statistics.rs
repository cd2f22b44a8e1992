// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Enumeration statistics.
//!
//! Counters are accumulated per enumeration task and merged by the driver
//! at join, alongside the signed counts themselves.

use strum::EnumCount;
use strum_macros::EnumCount as EnumCountMacro;

#[derive(EnumCountMacro, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Counters {
    /// Complete rectangles visited (both signs).
    Rectangles,
    /// Branches abandoned because a row had no remaining candidates.
    DeadEnds,
    /// Work units fully processed.
    UnitsCompleted,
}

/// Fixed array of counters, indexed by [`Counters`].
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    stats: [u64; Counters::COUNT],
}

impl Statistics {
    pub fn new() -> Self {
        Statistics::default()
    }

    /// Increment the specified counter by 1.
    #[inline]
    pub fn increment(&mut self, counter: Counters) {
        self.stats[counter as usize] += 1;
    }

    /// Add `amount` to the specified counter.
    #[inline]
    pub fn add(&mut self, counter: Counters, amount: u64) {
        self.stats[counter as usize] += amount;
    }

    /// Get the current value of the specified counter.
    pub fn get(&self, counter: Counters) -> u64 {
        self.stats[counter as usize]
    }

    /// Fold another task's counters into this one.
    pub fn merge(&mut self, other: &Statistics) {
        for (mine, theirs) in self.stats.iter_mut().zip(&other.stats) {
            *mine += theirs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_add_get() {
        let mut stats = Statistics::new();
        assert_eq!(stats.get(Counters::Rectangles), 0);
        stats.increment(Counters::Rectangles);
        stats.add(Counters::Rectangles, 9);
        stats.increment(Counters::DeadEnds);
        assert_eq!(stats.get(Counters::Rectangles), 10);
        assert_eq!(stats.get(Counters::DeadEnds), 1);
        assert_eq!(stats.get(Counters::UnitsCompleted), 0);
    }

    #[test]
    fn test_merge() {
        let mut a = Statistics::new();
        a.add(Counters::Rectangles, 5);
        let mut b = Statistics::new();
        b.add(Counters::Rectangles, 7);
        b.increment(Counters::UnitsCompleted);
        a.merge(&b);
        assert_eq!(a.get(Counters::Rectangles), 12);
        assert_eq!(a.get(Counters::UnitsCompleted), 1);
    }
}
