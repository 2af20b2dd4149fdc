use std::num::NonZeroUsize;

use xxhash_rust::xxh3::xxh3_64;

/// Size of the fixed partition-key space every shard factor is carved from.
pub const BUCKET_NUMBER: u64 = 65536;

/// Half-open bucket range `[from, to)` owned by one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub from: u64,
    pub to: u64,
}

impl Interval {
    #[must_use]
    pub fn contains(&self, bucket: u64) -> bool {
        self.from <= bucket && bucket < self.to
    }
}

/// Maps a partition key (a user UUID) to the index of the shard that owns it.
///
/// The interval table is computed once and never mutated, and the hash is
/// unseeded, so two routers built with the same factor agree on every key in
/// every process.
#[derive(Debug, Clone)]
pub struct ShardRouter {
    intervals: Vec<Interval>,
}

impl ShardRouter {
    #[must_use]
    pub fn new(shard_factor: NonZeroUsize) -> Self {
        Self {
            intervals: create_intervals(shard_factor),
        }
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn bucket_index(&self, key: &str) -> u64 {
        xxh3_64(key.as_bytes()) % BUCKET_NUMBER
    }

    /// Falls back to shard 0 for a bucket outside every interval, which the
    /// construction in [`create_intervals`] rules out.
    #[must_use]
    pub fn shard_for_bucket(&self, bucket: u64) -> usize {
        let idx = self.intervals.partition_point(|interval| interval.to <= bucket);
        match self.intervals.get(idx) {
            Some(interval) if interval.contains(bucket) => idx,
            _ => 0,
        }
    }

    #[must_use]
    pub fn shard_for_key(&self, key: &str) -> usize {
        self.shard_for_bucket(self.bucket_index(key))
    }
}

/// Splits `[0, BUCKET_NUMBER)` into `shard_factor` contiguous intervals.
///
/// The last interval always ends at `BUCKET_NUMBER` so the remainder of the
/// integer division lands on the last shard.
#[must_use]
pub fn create_intervals(shard_factor: NonZeroUsize) -> Vec<Interval> {
    let factor = shard_factor.get();
    let unit = BUCKET_NUMBER / factor as u64;

    let mut intervals: Vec<Interval> = (0..factor as u64)
        .map(|i| Interval {
            from: i * unit,
            to: (i + 1) * unit,
        })
        .collect();

    if let Some(last) = intervals.last_mut() {
        last.to = BUCKET_NUMBER;
    }

    intervals
}
