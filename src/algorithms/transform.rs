//! Derived representations: lower-triangular CSR and centered (signed) CSR

use crate::algorithms::transpose::{exclusive_prefix_sum, split_neighborhoods};
use crate::config::{GraphConfig, DEFAULT_PREFIX_BLOCK_LEN, DEFAULT_SORT_GRAIN};
use crate::error::{GraphError, GraphResult};
use crate::storage::aligned::{alloc_neighbors, alloc_offsets, AlignedBuffer};
use crate::storage::csr::CsrGraph;
use rayon::prelude::*;
use tracing::info;

/// Number of leading neighbors strictly below `row` (neighborhood must be sorted)
fn lower_len(row: usize, hood: &[u32]) -> u32 {
    hood.iter().take_while(|&&col| (col as usize) < row).count() as u32
}

fn lower_offsets(row_offsets: &[u32], col_indices: &[u32]) -> GraphResult<AlignedBuffer<u32>> {
    let n = row_offsets.len() - 1;
    let counts: Vec<u32> = row_offsets
        .par_windows(2)
        .enumerate()
        .with_min_len(DEFAULT_SORT_GRAIN)
        .map(|(row, w)| lower_len(row, &col_indices[w[0] as usize..w[1] as usize]))
        .collect();
    let mut offsets = alloc_offsets(n)?;
    exclusive_prefix_sum(&counts, &mut offsets, DEFAULT_PREFIX_BLOCK_LEN);
    Ok(offsets)
}

fn copy_lower(row_offsets: &[u32], src: &[u32], lower_offsets: &[u32], dst: &mut [u32]) {
    split_neighborhoods(lower_offsets, dst)
        .into_par_iter()
        .enumerate()
        .with_min_len(DEFAULT_SORT_GRAIN)
        .for_each(|(row, out)| {
            let start = row_offsets[row] as usize;
            out.copy_from_slice(&src[start..start + out.len()]);
        });
}

/// Keep only edges `(i, j)` with `j < i`
///
/// Each row stops at its first neighbor `>= i`, so neighborhoods **must be
/// sorted ascending**; unsorted input silently yields an incomplete triangle.
///
/// # Errors
///
/// Returns [`GraphError::Malformed`] if `row_offsets.len() != num_vertices + 1`
/// and [`GraphError::OutOfMemory`] on allocation failure.
///
/// # Example
///
/// ```
/// use gkc_graph::algorithms::csr_to_lower;
///
/// // Undirected triangle 0-1-2
/// let (ia, ja) = csr_to_lower(&[0, 2, 4, 6], &[1, 2, 0, 2, 0, 1], 3).unwrap();
/// assert_eq!(&ia[..], &[0, 0, 1, 3]);
/// assert_eq!(&ja[..], &[0, 0, 1]);
/// ```
pub fn csr_to_lower(
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
    let offsets = lower_offsets(row_offsets, col_indices)?;
    let mut neighbors = alloc_neighbors(offsets[num_vertices] as usize)?;
    copy_lower(row_offsets, col_indices, &offsets, &mut neighbors);

    info!(
        kept = offsets[num_vertices],
        edges = col_indices.len(),
        "extracted lower triangle"
    );
    Ok((offsets, neighbors))
}

impl CsrGraph {
    /// Lower-triangular copy of this graph, weights carried along
    ///
    /// Sorts a copy first if neighborhoods are not already sorted.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfMemory`] on allocation failure.
    pub fn lower_triangular(&self) -> GraphResult<Self> {
        if self.has_sorted_neighborhoods() {
            return lower_of_sorted(self);
        }
        let mut sorted = self.clone();
        sorted.sort_neighborhoods(&GraphConfig::default());
        lower_of_sorted(&sorted)
    }
}

fn lower_of_sorted(graph: &CsrGraph) -> GraphResult<CsrGraph> {
    let (ia, ja, wa) = graph.csr_components();
    let n = graph.num_nodes();
    let offsets = lower_offsets(ia, ja)?;
    let kept = offsets[n] as usize;

    let mut neighbors = alloc_neighbors(kept)?;
    copy_lower(ia, ja, &offsets, &mut neighbors);
    let weights = match wa {
        Some(wa) => {
            let mut weights = alloc_neighbors(kept)?;
            copy_lower(ia, wa, &offsets, &mut weights);
            Some(weights)
        }
        None => None,
    };
    Ok(CsrGraph::from_buffers_unchecked(offsets, neighbors, weights))
}

/// CSR with signed, zero-centered indices
///
/// Offsets are stored shifted by `-edge_bias` (`M / 2`) and neighbor ids by
/// `-vertex_bias` (`(N + 1) / 2`), so both arrays are indexed by signed
/// positions spanning a range symmetric around zero:
///
/// ```text
/// offsets:   index v' in [-vertex_bias, N + 1 - vertex_bias)   value e' = e - edge_bias
/// neighbors: index e' in [-edge_bias,   M - edge_bias)         value v' = v - vertex_bias
/// ```
///
/// All access is bounds-checked through the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenteredCsr {
    offsets: AlignedBuffer<i32>,
    neighbors: AlignedBuffer<i32>,
    vertex_bias: i64,
    edge_bias: i64,
}

/// Build the centered representation of `(IA, JA)`
///
/// # Errors
///
/// Returns [`GraphError::Malformed`] on mismatched lengths,
/// [`GraphError::TooLarge`] if a shifted value does not fit `i32` and
/// [`GraphError::OutOfMemory`] on allocation failure.
///
/// # Example
///
/// ```
/// use gkc_graph::algorithms::csr_to_center_csr;
///
/// let centered = csr_to_center_csr(&[0, 2, 3, 3], &[1, 2, 2], 3).unwrap();
/// let v = centered.signed_vertex(0);
/// let hood: Vec<u32> = centered
///     .neighbors(v)
///     .unwrap()
///     .iter()
///     .filter_map(|&s| centered.unsigned_vertex(s))
///     .collect();
/// assert_eq!(hood, vec![1, 2]);
/// ```
pub fn csr_to_center_csr(
    row_offsets: &[u32],
    col_indices: &[u32],
    num_vertices: usize,
) -> GraphResult<CenteredCsr> {
    if row_offsets.len() != num_vertices + 1 || row_offsets[num_vertices] as usize != col_indices.len() {
        return Err(GraphError::Malformed(format!(
            "{} offsets and {} neighbors for {num_vertices} vertices",
            row_offsets.len(),
            col_indices.len()
        )));
    }
    let vertex_bias = (num_vertices as i64 + 1) / 2;
    let edge_bias = col_indices.len() as i64 / 2;

    let offsets = shift(row_offsets, edge_bias, "centered offset")?;
    let neighbors = shift(col_indices, vertex_bias, "centered vertex id")?;
    Ok(CenteredCsr {
        offsets,
        neighbors,
        vertex_bias,
        edge_bias,
    })
}

fn shift(values: &[u32], bias: i64, what: &'static str) -> GraphResult<AlignedBuffer<i32>> {
    let mut out = AlignedBuffer::<i32>::zeroed(values.len())?;
    out.par_iter_mut()
        .zip(values.par_iter())
        .try_for_each(|(dst, &v)| {
            let shifted = i64::from(v) - bias;
            *dst = i32::try_from(shifted).map_err(|_| GraphError::TooLarge {
                what,
                value: u64::from(v),
            })?;
            Ok::<(), GraphError>(())
        })?;
    Ok(out)
}

impl CenteredCsr {
    /// Number of vertices
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.neighbors.len()
    }

    /// Shift applied to vertex ids (`(N + 1) / 2`)
    #[must_use]
    pub const fn vertex_bias(&self) -> i64 {
        self.vertex_bias
    }

    /// Shift applied to edge positions (`M / 2`)
    #[must_use]
    pub const fn edge_bias(&self) -> i64 {
        self.edge_bias
    }

    /// Signed id of vertex `v`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // fits by construction for v < N
    pub const fn signed_vertex(&self, v: u32) -> i32 {
        (v as i64 - self.vertex_bias) as i32
    }

    /// Unsigned id of a signed vertex id, if it names a vertex
    #[must_use]
    pub fn unsigned_vertex(&self, signed: i32) -> Option<u32> {
        let v = i64::from(signed) + self.vertex_bias;
        u32::try_from(v).ok().filter(|&v| (v as usize) < self.num_nodes())
    }

    /// Signed start of the neighborhood of signed vertex `v` (`v` may be `N`'s signed id)
    #[must_use]
    pub fn offset(&self, signed_vertex: i32) -> Option<i32> {
        index(signed_vertex, self.vertex_bias, self.offsets.len()).map(|i| self.offsets[i])
    }

    /// Signed vertex id stored at signed edge position `e`
    #[must_use]
    pub fn neighbor(&self, signed_edge: i32) -> Option<i32> {
        index(signed_edge, self.edge_bias, self.neighbors.len()).map(|i| self.neighbors[i])
    }

    /// Signed neighbor ids of signed vertex `v`
    #[must_use]
    pub fn neighbors(&self, signed_vertex: i32) -> Option<&[i32]> {
        let start = self.offset(signed_vertex)?;
        let end = self.offset(signed_vertex.checked_add(1)?)?;
        let start = usize::try_from(i64::from(start) + self.edge_bias).ok()?;
        let end = usize::try_from(i64::from(end) + self.edge_bias).ok()?;
        self.neighbors.get(start..end)
    }

    /// Underlying offsets storage (index 0 is signed vertex `-vertex_bias`)
    #[must_use]
    pub fn offsets_raw(&self) -> &[i32] {
        &self.offsets
    }

    /// Underlying neighbor storage (index 0 is signed edge `-edge_bias`)
    #[must_use]
    pub fn neighbors_raw(&self) -> &[i32] {
        &self.neighbors
    }
}

fn index(signed: i32, bias: i64, len: usize) -> Option<usize> {
    usize::try_from(i64::from(signed) + bias)
        .ok()
        .filter(|&i| i < len)
}
