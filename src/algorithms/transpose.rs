//! Parallel CSR → CSC transpose
//!
//! Four data-parallel phases, each finished (joined) before the next starts:
//!
//! 1. **Degree count**: every edge `(i, j)` bumps an atomic `degree[j]`.
//! 2. **Prefix sum**: two-level blocked exclusive scan of `degree` into the
//!    CSC offsets. Blocks are scanned in parallel, block totals are folded
//!    sequentially, then every block adds its base in parallel.
//! 3. **Scatter**: every edge `(i, j)` claims slot
//!    `offsets[j] + cursor[j].fetch_add(1)` and stores `i` there. Cursors are
//!    the degree counters, zeroed and reused.
//! 4. **Sort**: each CSC neighborhood is sorted, so the output depends only on
//!    the input graph and never on worker count or scheduling.
//!
//! No locks are taken; the only shared-mutable state is the atomic counter
//! array and the atomic view of the destination neighbor buffer, where each
//! slot is written by exactly one worker.

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::storage::aligned::{alloc_neighbors, alloc_offsets, AlignedBuffer};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Edges handed to a worker at a time in the degree-count phase
const EDGE_GRAIN: usize = 4096;

/// Transpose `(IA, JA)` with default settings
///
/// # Errors
///
/// See [`transpose_with`].
pub fn transpose(
    row_offsets: &[u32],
    col_indices: &[u32],
    num_vertices: usize,
) -> GraphResult<(AlignedBuffer<u32>, AlignedBuffer<u32>)> {
    transpose_with(
        row_offsets,
        col_indices,
        num_vertices,
        &GraphConfig::default(),
    )
}

/// Transpose `(IA, JA)` into `(IA_csc, JA_csc)` on the configured worker pool
///
/// The result is the exact transpose: column `j` of the output lists every
/// row `i` with an edge `(i, j)`, ascending, with multiplicity preserved.
///
/// The CSR graph is assumed well formed (validated at ingestion or load time);
/// only the array lengths are checked here.
///
/// # Errors
///
/// Returns [`GraphError::Malformed`] if `row_offsets.len() != num_vertices + 1`
/// or `row_offsets[N] != col_indices.len()`, [`GraphError::OutOfMemory`] if a
/// destination buffer cannot be allocated, and [`GraphError::ThreadPool`] if
/// a dedicated pool cannot be started.
///
/// # Panics
///
/// Panics if a column index is `>= num_vertices`.
///
/// # Example
///
/// ```
/// use gkc_graph::algorithms::transpose;
///
/// // 0 → 1, 0 → 2, 1 → 2
/// let (ia_csc, ja_csc) = transpose(&[0, 2, 3, 3], &[1, 2, 2], 3).unwrap();
/// assert_eq!(&ia_csc[..], &[0, 0, 1, 3]);
/// assert_eq!(&ja_csc[..], &[0, 0, 1]);
/// ```
pub fn transpose_with(
    row_offsets: &[u32],
    col_indices: &[u32],
    num_vertices: usize,
    config: &GraphConfig,
) -> GraphResult<(AlignedBuffer<u32>, AlignedBuffer<u32>)> {
    if row_offsets.len() != num_vertices + 1 {
        return Err(GraphError::Malformed(format!(
            "{} offsets for {num_vertices} vertices",
            row_offsets.len()
        )));
    }
    if row_offsets[num_vertices] as usize != col_indices.len() {
        return Err(GraphError::Malformed(format!(
            "offsets end at {} but {} neighbors are stored",
            row_offsets[num_vertices],
            col_indices.len()
        )));
    }

    config.install(|| transpose_in_pool(row_offsets, col_indices, num_vertices, config))?
}

fn transpose_in_pool(
    row_offsets: &[u32],
    col_indices: &[u32],
    num_vertices: usize,
    config: &GraphConfig,
) -> GraphResult<(AlignedBuffer<u32>, AlignedBuffer<u32>)> {
    let total = Instant::now();
    let mut csc_offsets = alloc_offsets(num_vertices)?;
    let mut csc_indices = alloc_neighbors(col_indices.len())?;
    let mut counters = AlignedBuffer::<u32>::zeroed(num_vertices)?;

    let start = Instant::now();
    count_degrees(col_indices, counters.as_atomic());
    debug!(elapsed = ?start.elapsed(), "counted in-degrees");

    let start = Instant::now();
    exclusive_prefix_sum(&counters, &mut csc_offsets, config.prefix_block_len);
    debug!(elapsed = ?start.elapsed(), "computed CSC offsets");

    let start = Instant::now();
    counters[..].par_iter_mut().for_each(|c| *c = 0);
    scatter(
        row_offsets,
        col_indices,
        &csc_offsets,
        counters.as_atomic(),
        csc_indices.as_atomic(),
        config.sort_grain,
    );
    debug!(elapsed = ?start.elapsed(), "scattered edges");

    let start = Instant::now();
    sort_neighborhoods(&csc_offsets, &mut csc_indices, config.sort_grain);
    debug!(elapsed = ?start.elapsed(), "sorted CSC neighborhoods");

    info!(
        vertices = num_vertices,
        edges = col_indices.len(),
        threads = rayon::current_num_threads(),
        elapsed = ?total.elapsed(),
        "transposed graph"
    );
    Ok((csc_offsets, csc_indices))
}

fn count_degrees(col_indices: &[u32], degrees: &[AtomicU32]) {
    col_indices
        .par_iter()
        .with_min_len(EDGE_GRAIN)
        .for_each(|&col| {
            degrees[col as usize].fetch_add(1, Ordering::Relaxed);
        });
}

#[allow(clippy::cast_possible_truncation)] // row < N <= u32::MAX
fn scatter(
    row_offsets: &[u32],
    col_indices: &[u32],
    csc_offsets: &[u32],
    cursors: &[AtomicU32],
    targets: &[AtomicU32],
    grain: usize,
) {
    (0..row_offsets.len() - 1)
        .into_par_iter()
        .with_min_len(grain.max(1))
        .for_each(|row| {
            let start = row_offsets[row] as usize;
            let end = row_offsets[row + 1] as usize;
            for &col in &col_indices[start..end] {
                let col = col as usize;
                let slot = csc_offsets[col] + cursors[col].fetch_add(1, Ordering::Relaxed);
                targets[slot as usize].store(row as u32, Ordering::Relaxed);
            }
        });
}

/// Exclusive prefix sum of `counts` into `offsets` (`offsets.len() == counts.len() + 1`)
///
/// Two-level scheme over blocks of `block_len` elements: parallel in-block
/// inclusive scans, a sequential fold of block totals into per-block bases,
/// then a parallel pass adding each base to its block.
///
/// # Panics
///
/// Panics if `offsets.len() != counts.len() + 1`.
///
/// # Example
///
/// ```
/// use gkc_graph::algorithms::exclusive_prefix_sum;
///
/// let mut offsets = vec![0; 5];
/// exclusive_prefix_sum(&[2, 0, 3, 1], &mut offsets, 2);
/// assert_eq!(offsets, vec![0, 2, 2, 5, 6]);
/// ```
pub fn exclusive_prefix_sum(counts: &[u32], offsets: &mut [u32], block_len: usize) {
    assert_eq!(
        offsets.len(),
        counts.len() + 1,
        "offsets must have one more entry than counts"
    );
    let block_len = block_len.max(1);

    offsets[0] = 0;
    let sums = &mut offsets[1..];

    sums.par_chunks_mut(block_len)
        .zip(counts.par_chunks(block_len))
        .for_each(|(out, block)| {
            let mut running = 0_u32;
            for (slot, &count) in out.iter_mut().zip(block) {
                running += count;
                *slot = running;
            }
        });

    let mut bases = Vec::with_capacity(sums.len().div_ceil(block_len));
    let mut base = 0_u32;
    for block in sums.chunks(block_len) {
        bases.push(base);
        base += block.last().copied().unwrap_or(0);
    }

    sums.par_chunks_mut(block_len)
        .zip(bases.par_iter())
        .for_each(|(block, &base)| {
            if base != 0 {
                for slot in block {
                    *slot += base;
                }
            }
        });
}

/// Sort every neighborhood of a compressed array in place, in parallel
///
/// # Panics
///
/// Panics if `offsets` does not describe a partition of `neighbors`.
pub fn sort_neighborhoods(offsets: &[u32], neighbors: &mut [u32], grain: usize) {
    split_neighborhoods(offsets, neighbors)
        .into_par_iter()
        .with_min_len(grain.max(1))
        .for_each(|hood| hood.sort_unstable());
}

/// Sort neighborhoods by id, permuting weights alongside (stable on equal ids)
///
/// # Panics
///
/// Panics if `offsets` does not describe a partition of `neighbors` and `weights`.
pub fn sort_weighted_neighborhoods(
    offsets: &[u32],
    neighbors: &mut [u32],
    weights: &mut [u32],
    grain: usize,
) {
    let hoods = split_neighborhoods(offsets, neighbors);
    let hood_weights = split_neighborhoods(offsets, weights);
    hoods
        .into_par_iter()
        .zip(hood_weights)
        .with_min_len(grain.max(1))
        .for_each(|(ids, ws)| {
            if ids.windows(2).all(|p| p[0] <= p[1]) {
                return;
            }
            let mut pairs: Vec<(u32, u32)> = ids.iter().copied().zip(ws.iter().copied()).collect();
            pairs.sort_by_key(|&(id, _)| id);
            for ((id, w), (dst_id, dst_w)) in pairs.into_iter().zip(ids.iter_mut().zip(ws.iter_mut())) {
                *dst_id = id;
                *dst_w = w;
            }
        });
}

/// Split `values` into one mutable slice per vertex
pub(crate) fn split_neighborhoods<'a, T>(offsets: &[u32], values: &'a mut [T]) -> Vec<&'a mut [T]> {
    let mut hoods = Vec::with_capacity(offsets.len().saturating_sub(1));
    let mut rest = values;
    for w in offsets.windows(2) {
        let len = (w[1] - w[0]) as usize;
        let (hood, tail) = std::mem::take(&mut rest).split_at_mut(len);
        hoods.push(hood);
        rest = tail;
    }
    hoods
}

/// Single-threaded transpose (bucket per column)
///
/// Reference implementation producing the same buffers as [`transpose`].
///
/// # Errors
///
/// Returns [`GraphError::OutOfMemory`] if the destination buffers cannot be
/// allocated and [`GraphError::Malformed`] on mismatched array lengths.
///
/// # Panics
///
/// Panics if a column index is `>= num_vertices`.
#[allow(clippy::cast_possible_truncation)] // row < N <= u32::MAX, edge count fits IA
pub fn transpose_sequential(
    row_offsets: &[u32],
    col_indices: &[u32],
    num_vertices: usize,
) -> GraphResult<(AlignedBuffer<u32>, AlignedBuffer<u32>)> {
    if row_offsets.len() != num_vertices + 1 {
        return Err(GraphError::Malformed(format!(
            "{} offsets for {num_vertices} vertices",
            row_offsets.len()
        )));
    }

    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); num_vertices];
    for (row, w) in row_offsets.windows(2).enumerate() {
        for &col in &col_indices[w[0] as usize..w[1] as usize] {
            buckets[col as usize].push(row as u32);
        }
    }

    let mut csc_offsets = alloc_offsets(num_vertices)?;
    let mut csc_indices = alloc_neighbors(col_indices.len())?;
    let mut cursor = 0_usize;
    // Rows are visited in ascending order, so every bucket is already sorted.
    for (col, bucket) in buckets.iter().enumerate() {
        csc_indices[cursor..cursor + bucket.len()].copy_from_slice(bucket);
        cursor += bucket.len();
        csc_offsets[col + 1] = cursor as u32;
    }
    Ok((csc_offsets, csc_indices))
}
