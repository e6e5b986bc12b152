//! CSR (Compressed Sparse Row) and CSC (Compressed Sparse Column) graphs
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2
//!
//! CSR:
//!   row_offsets: [0, 2, 3, 3]  // Node 0: edges [0..2), Node 1: [2..3), Node 2: [3..3)
//!   col_indices: [1, 2, 2]      // Edge 0 → node 1, edge 1 → node 2, edge 2 → node 2
//!
//! CSC (transpose):
//!   col_offsets: [0, 0, 1, 3]  // Node 2 is reached from rows [1..3) of row_indices
//!   row_indices: [0, 0, 1]
//! ```
//!
//! Both forms own their arrays in cache-aligned buffers and are immutable
//! once built; any number of kernel threads may read them concurrently.

use crate::algorithms::transpose;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::storage::aligned::AlignedBuffer;
use anyhow::{anyhow, Result};
use rayon::prelude::*;

/// Node identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// CSR graph: out-neighborhoods stored row by row
///
/// Invariants (checked by every public constructor):
/// - `row_offsets[0] == 0` and offsets are non-decreasing
/// - `row_offsets[N] == col_indices.len()`
/// - every column index is `< N`
/// - `edge_weights`, when present, is index-aligned with `col_indices`
///
/// # Example
///
/// ```
/// use gkc_graph::{CsrGraph, NodeId};
///
/// let graph = CsrGraph::from_parts(&[0, 2, 3, 3], &[1, 2, 2], None).unwrap();
///
/// assert_eq!(graph.outgoing_neighbors(NodeId(0)).unwrap(), &[1, 2]);
/// assert_eq!(graph.num_edges(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrGraph {
    /// IA: node i's edges live in `col_indices[row_offsets[i]..row_offsets[i + 1]]`
    /// Length: `num_nodes` + 1
    row_offsets: AlignedBuffer<u32>,

    /// JA: edge targets
    /// Length: `num_edges`
    col_indices: AlignedBuffer<u32>,

    /// WA: edge weights, index-aligned with `col_indices`
    edge_weights: Option<AlignedBuffer<u32>>,
}

impl CsrGraph {
    /// Build a graph by copying raw arrays
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Malformed`] if the arrays violate a CSR invariant
    /// and [`GraphError::OutOfMemory`] if the copies cannot be allocated.
    pub fn from_parts(
        row_offsets: &[u32],
        col_indices: &[u32],
        edge_weights: Option<&[u32]>,
    ) -> GraphResult<Self> {
        let weights = edge_weights.map(AlignedBuffer::from_slice).transpose()?;
        Self::from_buffers(
            AlignedBuffer::from_slice(row_offsets)?,
            AlignedBuffer::from_slice(col_indices)?,
            weights,
        )
    }

    /// Adopt already-allocated buffers after validating them
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Malformed`] if the arrays violate a CSR invariant.
    pub fn from_buffers(
        row_offsets: AlignedBuffer<u32>,
        col_indices: AlignedBuffer<u32>,
        edge_weights: Option<AlignedBuffer<u32>>,
    ) -> GraphResult<Self> {
        validate_compressed(&row_offsets, &col_indices)?;
        if let Some(weights) = &edge_weights {
            if weights.len() != col_indices.len() {
                return Err(GraphError::Malformed(format!(
                    "{} weights for {} edges",
                    weights.len(),
                    col_indices.len()
                )));
            }
        }
        Ok(Self::from_buffers_unchecked(
            row_offsets,
            col_indices,
            edge_weights,
        ))
    }

    /// Adopt buffers produced by an internal builder that upholds the invariants
    pub(crate) fn from_buffers_unchecked(
        row_offsets: AlignedBuffer<u32>,
        col_indices: AlignedBuffer<u32>,
        edge_weights: Option<AlignedBuffer<u32>>,
    ) -> Self {
        debug_assert!(!row_offsets.is_empty());
        Self {
            row_offsets,
            col_indices,
            edge_weights,
        }
    }

    /// Get outgoing neighbors of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn outgoing_neighbors(&self, node: NodeId) -> Result<&[u32]> {
        let (start, end) = self.bounds(node)?;
        Ok(&self.col_indices[start..end])
    }

    /// Get the weights of a node's outgoing edges (`None` for unweighted graphs)
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn outgoing_weights(&self, node: NodeId) -> Result<Option<&[u32]>> {
        let (start, end) = self.bounds(node)?;
        Ok(self.edge_weights.as_ref().map(|w| &w[start..end]))
    }

    /// Out-degree of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn out_degree(&self, node: NodeId) -> Result<usize> {
        let (start, end) = self.bounds(node)?;
        Ok(end - start)
    }

    fn bounds(&self, node: NodeId) -> Result<(usize, usize)> {
        neighborhood_bounds(&self.row_offsets, node)
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// True when a weight array accompanies the edges
    #[must_use]
    pub const fn is_weighted(&self) -> bool {
        self.edge_weights.is_some()
    }

    /// Get CSR components `(IA, JA, WA)`
    #[must_use]
    pub fn csr_components(&self) -> (&[u32], &[u32], Option<&[u32]>) {
        (
            &self.row_offsets,
            &self.col_indices,
            self.edge_weights.as_deref(),
        )
    }

    /// Release the underlying buffers
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        AlignedBuffer<u32>,
        AlignedBuffer<u32>,
        Option<AlignedBuffer<u32>>,
    ) {
        (self.row_offsets, self.col_indices, self.edge_weights)
    }

    /// Drop the weight array
    #[must_use]
    pub fn without_weights(mut self) -> Self {
        self.edge_weights = None;
        self
    }

    /// Iterate edges as `(source, target, weight)`
    ///
    /// Unweighted graphs report unit weights.
    #[allow(clippy::cast_possible_truncation)] // row < N <= u32::MAX
    pub fn iter_edges(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.row_offsets
            .windows(2)
            .enumerate()
            .flat_map(move |(row, w)| {
                (w[0] as usize..w[1] as usize).map(move |e| {
                    let weight = self.edge_weights.as_ref().map_or(1, |wa| wa[e]);
                    (row as u32, self.col_indices[e], weight)
                })
            })
    }

    /// True when every neighborhood is strictly ascending
    #[must_use]
    pub fn has_sorted_neighborhoods(&self) -> bool {
        sorted_strictly(&self.row_offsets, &self.col_indices)
    }

    /// Sort every neighborhood ascending, carrying weights along
    ///
    /// Neighbors with equal ids keep their relative order.
    pub fn sort_neighborhoods(&mut self, config: &GraphConfig) {
        match self.edge_weights.as_mut() {
            Some(weights) => transpose::sort_weighted_neighborhoods(
                &self.row_offsets,
                &mut self.col_indices,
                weights,
                config.sort_grain,
            ),
            None => transpose::sort_neighborhoods(
                &self.row_offsets,
                &mut self.col_indices,
                config.sort_grain,
            ),
        }
    }

    /// Compute the CSC form (incoming neighborhoods) with default settings
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfMemory`] if the CSC buffers cannot be allocated.
    pub fn transpose(&self) -> GraphResult<CscGraph> {
        self.transpose_with(&GraphConfig::default())
    }

    /// Compute the CSC form on the configured worker pool
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfMemory`] on allocation failure and
    /// [`GraphError::ThreadPool`] if a dedicated pool cannot be started.
    pub fn transpose_with(&self, config: &GraphConfig) -> GraphResult<CscGraph> {
        let (col_offsets, row_indices) = transpose::transpose_with(
            &self.row_offsets,
            &self.col_indices,
            self.num_nodes(),
            config,
        )?;
        Ok(CscGraph {
            col_offsets,
            row_indices,
        })
    }
}

/// CSC graph: in-neighborhoods stored column by column
///
/// Produced by [`CsrGraph::transpose`]; column `j` lists every row `i` with an
/// edge `(i, j)`, sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CscGraph {
    /// Column j's sources live in `row_indices[col_offsets[j]..col_offsets[j + 1]]`
    col_offsets: AlignedBuffer<u32>,

    /// Edge sources, grouped by target
    row_indices: AlignedBuffer<u32>,
}

impl CscGraph {
    /// Build a CSC graph by copying raw arrays
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Malformed`] if the arrays are not a valid
    /// compressed layout.
    pub fn from_parts(col_offsets: &[u32], row_indices: &[u32]) -> GraphResult<Self> {
        let col_offsets = AlignedBuffer::from_slice(col_offsets)?;
        let row_indices = AlignedBuffer::from_slice(row_indices)?;
        validate_compressed(&col_offsets, &row_indices)?;
        Ok(Self {
            col_offsets,
            row_indices,
        })
    }

    /// Get incoming neighbors of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn incoming_neighbors(&self, target: NodeId) -> Result<&[u32]> {
        let (start, end) = neighborhood_bounds(&self.col_offsets, target)?;
        Ok(&self.row_indices[start..end])
    }

    /// In-degree of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn in_degree(&self, target: NodeId) -> Result<usize> {
        let (start, end) = neighborhood_bounds(&self.col_offsets, target)?;
        Ok(end - start)
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.col_offsets.len() - 1
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.row_indices.len()
    }

    /// Get CSC components `(IA_csc, JA_csc)`
    #[must_use]
    pub fn csc_components(&self) -> (&[u32], &[u32]) {
        (&self.col_offsets, &self.row_indices)
    }

    /// Release the underlying buffers
    #[must_use]
    pub fn into_parts(self) -> (AlignedBuffer<u32>, AlignedBuffer<u32>) {
        (self.col_offsets, self.row_indices)
    }

    /// True when every neighborhood is strictly ascending
    #[must_use]
    pub fn has_sorted_neighborhoods(&self) -> bool {
        sorted_strictly(&self.col_offsets, &self.row_indices)
    }

    /// Transpose back to CSR (unweighted)
    ///
    /// # Errors
    ///
    /// Same as [`CsrGraph::transpose_with`].
    pub fn transpose_with(&self, config: &GraphConfig) -> GraphResult<CsrGraph> {
        let (row_offsets, col_indices) = transpose::transpose_with(
            &self.col_offsets,
            &self.row_indices,
            self.num_nodes(),
            config,
        )?;
        Ok(CsrGraph::from_buffers_unchecked(
            row_offsets,
            col_indices,
            None,
        ))
    }

    /// Transpose back to CSR with default settings
    ///
    /// # Errors
    ///
    /// Same as [`CsrGraph::transpose_with`].
    pub fn transpose(&self) -> GraphResult<CsrGraph> {
        self.transpose_with(&GraphConfig::default())
    }
}

fn neighborhood_bounds(offsets: &[u32], node: NodeId) -> Result<(usize, usize)> {
    let idx = node.0 as usize;
    if idx + 1 >= offsets.len() {
        return Err(anyhow!("Node ID {} out of bounds", node.0));
    }
    Ok((offsets[idx] as usize, offsets[idx + 1] as usize))
}

fn sorted_strictly(offsets: &[u32], values: &[u32]) -> bool {
    offsets.par_windows(2).all(|w| {
        values[w[0] as usize..w[1] as usize]
            .windows(2)
            .all(|pair| pair[0] < pair[1])
    })
}

/// Check the shape shared by CSR and CSC arrays
pub(crate) fn validate_compressed(offsets: &[u32], values: &[u32]) -> GraphResult<()> {
    let Some((&first, _)) = offsets.split_first() else {
        return Err(GraphError::Malformed("offsets array is empty".into()));
    };
    if first != 0 {
        return Err(GraphError::Malformed(format!(
            "offsets start at {first}, expected 0"
        )));
    }
    if let Some(pos) = offsets.par_windows(2).position_any(|w| w[0] > w[1]) {
        return Err(GraphError::Malformed(format!(
            "offsets decrease at vertex {pos}"
        )));
    }
    let last = offsets[offsets.len() - 1] as usize;
    if last != values.len() {
        return Err(GraphError::Malformed(format!(
            "offsets end at {last} but {} neighbors are stored",
            values.len()
        )));
    }
    let n = offsets.len() - 1;
    if let Some(&bad) = values.par_iter().find_any(|&&v| v as usize >= n) {
        return Err(GraphError::Malformed(format!(
            "neighbor id {bad} out of range for {n} vertices"
        )));
    }
    Ok(())
}
