//! Cache broom: evict caches between timed trials
//!
//! Each worker writes through a private scratch buffer larger than a typical
//! last-level cache, so the next trial starts cold. Nothing persists between
//! calls.

use std::hint::black_box;

/// Scratch bytes swept per worker (30 MiB)
pub const DEFAULT_BROOM_BYTES: usize = 30 * 1024 * 1024;

/// Dirty `bytes` of fresh memory on every worker of the current pool
///
/// Returns the number of workers that swept.
pub fn sweep_caches(bytes: usize) -> usize {
    rayon::broadcast(|_| {
        let mut scratch = vec![0_u8; bytes];
        for b in &mut scratch {
            *b = b.wrapping_add(2);
        }
        black_box(&scratch);
    })
    .len()
}
