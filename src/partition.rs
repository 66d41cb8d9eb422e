//! Work partitioner shared by both pipelines.
//!
//! Splits a sequence into P contiguous shards of ceil(M/P) items; trailing
//! shards may be shorter or empty. Concatenating the shards in order always
//! reconstructs the input exactly. Shard index is used for progress display
//! only, never for correctness.

use std::ops::Range;

/// Split `0..len` into exactly `workers` contiguous ranges.
///
/// Panics if `workers` is zero; both drivers validate their worker count
/// before calling.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    assert!(workers > 0, "worker count must be positive");
    let chunk = len.div_ceil(workers).max(1);
    (0..workers)
        .map(|i| {
            let start = (i * chunk).min(len);
            let end = ((i + 1) * chunk).min(len);
            start..end
        })
        .collect()
}
