//! Edge-list ingestion: range checks, self-loop removal, symmetrization, dedup
//!
//! Triples are bucketed by row in input order, each row is stably sorted by
//! column and deduplicated in parallel, then the rows are concatenated into
//! aligned `IA`/`JA`/`WA` buffers.
//!
//! # Duplicate policy
//!
//! When several triples share `(row, col)`, the **first occurrence in input
//! order** survives and the weights of later duplicates are discarded. A
//! mirrored triple produced by symmetrization counts as occurring immediately
//! after the triple it mirrors.

use crate::algorithms::transpose::split_neighborhoods;
use crate::config::GraphConfig;
use crate::error::{to_u32, GraphError, GraphResult};
use crate::storage::aligned::{alloc_neighbors, alloc_offsets};
use crate::storage::csr::CsrGraph;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One weighted edge of an input edge list (0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triple {
    /// Source vertex
    pub row: u32,
    /// Destination vertex
    pub col: u32,
    /// Edge weight
    pub weight: u32,
}

impl Triple {
    /// Create a triple
    #[must_use]
    pub const fn new(row: u32, col: u32, weight: u32) -> Self {
        Self { row, col, weight }
    }

    const fn is_self_loop(&self) -> bool {
        self.row == self.col
    }
}

impl From<(u32, u32, u32)> for Triple {
    fn from((row, col, weight): (u32, u32, u32)) -> Self {
        Self::new(row, col, weight)
    }
}

/// Caller's symmetrization choice plus what is known about the input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Add `(j, i, w)` for every `(i, j, w)`
    pub symmetrize: bool,
    /// Input is declared symmetric (e.g. Matrix-Market `symmetric` banner)
    pub declared_symmetric: bool,
}

impl IngestOptions {
    /// Keep the edge list as given
    #[must_use]
    pub const fn directed() -> Self {
        Self {
            symmetrize: false,
            declared_symmetric: false,
        }
    }

    /// Mirror every edge
    #[must_use]
    pub const fn symmetrized() -> Self {
        Self {
            symmetrize: true,
            declared_symmetric: false,
        }
    }

    /// Record whether the input is declared symmetric
    #[must_use]
    pub const fn with_declared_symmetric(mut self, declared: bool) -> Self {
        self.declared_symmetric = declared;
        self
    }

    /// Diagnostic for this combination (`None` for plain directed input)
    #[must_use]
    pub const fn diagnostic(&self) -> Option<SymmetryDiagnostic> {
        match (self.declared_symmetric, self.symmetrize) {
            (true, true) => Some(SymmetryDiagnostic::RedundantSymmetrize),
            (true, false) => Some(SymmetryDiagnostic::DeclinedSymmetric),
            (false, true) => Some(SymmetryDiagnostic::Symmetrized),
            (false, false) => None,
        }
    }
}

/// Non-fatal note about the symmetrization choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetryDiagnostic {
    /// Input already symmetric and symmetrization requested: every edge is
    /// duplicated both ways, which is likely not what the caller wants
    RedundantSymmetrize,
    /// Input symmetric but symmetrization declined: the output only holds the
    /// stored triangle, and kernels expecting a full matrix may misbehave
    DeclinedSymmetric,
    /// Asymmetric input symmetrized (the expected use)
    Symmetrized,
}

impl SymmetryDiagnostic {
    /// Human-readable explanation
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::RedundantSymmetrize => {
                "input is declared symmetric and symmetrization was requested; all edges are duplicated both ways"
            }
            Self::DeclinedSymmetric => {
                "input is declared symmetric but symmetrization was declined; only the stored triangle is kept"
            }
            Self::Symmetrized => "input is not symmetric; mirroring every edge",
        }
    }

    fn log(self) {
        match self {
            Self::Symmetrized => info!(diagnostic = ?self, "{}", self.message()),
            _ => warn!(diagnostic = ?self, "{}", self.message()),
        }
    }
}

/// Counters gathered while ingesting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Triples supplied by the caller
    pub input_triples: usize,
    /// Triples dropped because `row == col`
    pub self_loops: usize,
    /// Mirrored triples added by symmetrization
    pub mirrored: usize,
    /// Edges dropped as duplicates of an earlier `(row, col)`
    pub duplicates: usize,
    /// Edges in the resulting graph
    pub edges: usize,
}

/// Result of [`ingest`]
#[derive(Debug, Clone)]
pub struct Ingested {
    /// Weighted CSR graph with sorted, duplicate-free neighborhoods
    pub graph: CsrGraph,
    /// Symmetrization note, if any
    pub diagnostic: Option<SymmetryDiagnostic>,
    /// What was dropped or added along the way
    pub stats: IngestStats,
}

/// Build a weighted CSR graph from an edge list with default settings
///
/// # Errors
///
/// See [`ingest_with`].
///
/// # Example
///
/// ```
/// use gkc_graph::algorithms::{ingest, IngestOptions, Triple};
///
/// let triples = [Triple::new(0, 1, 5), Triple::new(0, 1, 9), Triple::new(1, 0, 3)];
/// let out = ingest(&triples, 2, IngestOptions::directed()).unwrap();
/// let (ia, ja, wa) = out.graph.csr_components();
/// assert_eq!(ia, &[0, 1, 2]);
/// assert_eq!(ja, &[1, 0]);
/// assert_eq!(wa, Some(&[5, 3][..]));
/// ```
pub fn ingest(
    triples: &[Triple],
    num_vertices: usize,
    options: IngestOptions,
) -> GraphResult<Ingested> {
    ingest_with(triples, num_vertices, options, &GraphConfig::default())
}

/// Build a weighted CSR graph from an edge list on the configured worker pool
///
/// # Errors
///
/// - [`GraphError::VertexOutOfRange`] for the first triple (in input order)
///   with an endpoint `>= num_vertices`
/// - [`GraphError::TooLarge`] if the vertex or edge count does not fit `u32`
/// - [`GraphError::OutOfMemory`] if the output buffers cannot be allocated
/// - [`GraphError::ThreadPool`] if a dedicated pool cannot be started
pub fn ingest_with(
    triples: &[Triple],
    num_vertices: usize,
    options: IngestOptions,
    config: &GraphConfig,
) -> GraphResult<Ingested> {
    to_u32("vertex count", num_vertices)?;
    config.install(|| ingest_in_pool(triples, num_vertices, options, config))?
}

fn ingest_in_pool(
    triples: &[Triple],
    num_vertices: usize,
    options: IngestOptions,
    config: &GraphConfig,
) -> GraphResult<Ingested> {
    let total = Instant::now();

    if let Some(bad) = triples
        .par_iter()
        .find_first(|t| t.row as usize >= num_vertices || t.col as usize >= num_vertices)
    {
        return Err(GraphError::VertexOutOfRange {
            row: u64::from(bad.row),
            col: u64::from(bad.col),
            num_vertices: num_vertices as u64,
        });
    }

    let diagnostic = options.diagnostic();
    if let Some(d) = diagnostic {
        d.log();
    }

    let mut stats = IngestStats {
        input_triples: triples.len(),
        ..IngestStats::default()
    };

    let start = Instant::now();
    let mut rows: Vec<Vec<(u32, u32)>> = vec![Vec::new(); num_vertices];
    for t in triples {
        if t.is_self_loop() {
            stats.self_loops += 1;
            continue;
        }
        rows[t.row as usize].push((t.col, t.weight));
        if options.symmetrize {
            rows[t.col as usize].push((t.row, t.weight));
            stats.mirrored += 1;
        }
    }
    debug!(elapsed = ?start.elapsed(), "bucketed triples by row");

    let start = Instant::now();
    stats.duplicates = rows
        .par_iter_mut()
        .with_min_len(config.sort_grain.max(1))
        .map(|row| {
            let before = row.len();
            // Stable: equal columns keep input order, so dedup keeps the first.
            row.sort_by_key(|&(col, _)| col);
            row.dedup_by_key(|&mut (col, _)| col);
            before - row.len()
        })
        .sum();
    debug!(elapsed = ?start.elapsed(), duplicates = stats.duplicates, "sorted and deduplicated rows");

    let start = Instant::now();
    let mut row_offsets = alloc_offsets(num_vertices)?;
    let mut running = 0_usize;
    for (slot, row) in row_offsets[1..].iter_mut().zip(&rows) {
        running += row.len();
        *slot = to_u32("edge count", running)?;
    }
    stats.edges = running;

    let mut col_indices = alloc_neighbors(running)?;
    let mut edge_weights = alloc_neighbors(running)?;
    split_neighborhoods(&row_offsets, &mut col_indices)
        .into_par_iter()
        .zip(split_neighborhoods(&row_offsets, &mut edge_weights))
        .zip(rows.par_iter())
        .with_min_len(config.sort_grain.max(1))
        .for_each(|((cols, weights), row)| {
            for ((c, w), &(col, weight)) in cols.iter_mut().zip(weights.iter_mut()).zip(row) {
                *c = col;
                *w = weight;
            }
        });
    debug!(elapsed = ?start.elapsed(), "assembled CSR arrays");

    info!(
        vertices = num_vertices,
        triples = stats.input_triples,
        self_loops = stats.self_loops,
        duplicates = stats.duplicates,
        edges = stats.edges,
        elapsed = ?total.elapsed(),
        "ingested edge list"
    );

    Ok(Ingested {
        graph: CsrGraph::from_buffers_unchecked(row_offsets, col_indices, Some(edge_weights)),
        diagnostic,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csr::NodeId;

    fn triples(raw: &[(u32, u32, u32)]) -> Vec<Triple> {
        raw.iter().copied().map(Triple::from).collect()
    }

    #[test]
    fn test_first_occurrence_wins() {
        let input = triples(&[(0, 1, 5), (0, 1, 9), (1, 0, 3)]);
        let out = ingest(&input, 2, IngestOptions::directed()).unwrap();

        let (ia, ja, wa) = out.graph.csr_components();
        assert_eq!(ia, &[0, 1, 2]);
        assert_eq!(ja, &[1, 0]);
        assert_eq!(wa, Some(&[5, 3][..]));
        assert_eq!(out.stats.duplicates, 1);
        assert_eq!(out.diagnostic, None);
    }

    #[test]
    fn test_symmetrize() {
        let input = triples(&[(0, 1, 5)]);
        let out = ingest(&input, 2, IngestOptions::symmetrized()).unwrap();

        let (ia, ja, wa) = out.graph.csr_components();
        assert_eq!(ia, &[0, 1, 2]);
        assert_eq!(ja, &[1, 0]);
        assert_eq!(wa, Some(&[5, 5][..]));
        assert_eq!(out.stats.mirrored, 1);
        assert_eq!(out.diagnostic, Some(SymmetryDiagnostic::Symmetrized));
    }

    #[test]
    fn test_self_loops_dropped() {
        for options in [IngestOptions::directed(), IngestOptions::symmetrized()] {
            let input = triples(&[(3, 3, 7), (0, 3, 1)]);
            let out = ingest(&input, 4, options).unwrap();
            assert_eq!(out.stats.self_loops, 1);
            assert!(!out.graph.iter_edges().any(|(r, c, _)| r == c));
        }
    }

    #[test]
    fn test_mirror_does_not_override_explicit_edge() {
        // (1, 0, 8) appears later in input than the mirror of (0, 1, 2)
        let input = triples(&[(0, 1, 2), (1, 0, 8)]);
        let out = ingest(&input, 2, IngestOptions::symmetrized()).unwrap();
        let (_, ja, wa) = out.graph.csr_components();
        assert_eq!(ja, &[1, 0]);
        assert_eq!(wa, Some(&[2, 2][..]));
        assert_eq!(out.stats.duplicates, 2);
    }

    #[test]
    fn test_rows_sorted_and_unique() {
        let input = triples(&[(2, 4, 1), (2, 0, 1), (2, 3, 1), (2, 0, 2), (0, 4, 1)]);
        let out = ingest(&input, 5, IngestOptions::directed()).unwrap();
        assert_eq!(out.graph.outgoing_neighbors(NodeId(2)).unwrap(), &[0, 3, 4]);
        assert!(out.graph.has_sorted_neighborhoods());
        assert_eq!(out.stats.edges, 4);
    }

    #[test]
    fn test_out_of_range_reports_first_offender() {
        let input = triples(&[(0, 1, 1), (5, 0, 1), (0, 9, 1)]);
        let err = ingest(&input, 3, IngestOptions::directed()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::VertexOutOfRange {
                row: 5,
                col: 0,
                num_vertices: 3
            }
        ));
    }

    #[test]
    fn test_empty_input() {
        let out = ingest(&[], 3, IngestOptions::directed()).unwrap();
        assert_eq!(out.graph.num_nodes(), 3);
        assert_eq!(out.graph.num_edges(), 0);
    }

    #[test]
    fn test_diagnostics() {
        let declared = IngestOptions::directed().with_declared_symmetric(true);
        assert_eq!(
            declared.diagnostic(),
            Some(SymmetryDiagnostic::DeclinedSymmetric)
        );
        let redundant = IngestOptions::symmetrized().with_declared_symmetric(true);
        assert_eq!(
            redundant.diagnostic(),
            Some(SymmetryDiagnostic::RedundantSymmetrize)
        );
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let input: Vec<Triple> = (0..2000_u32)
            .map(|i| Triple::new(i * 7 % 101, i * 13 % 101, i))
            .collect();
        let reference = ingest(&input, 101, IngestOptions::symmetrized()).unwrap();
        for threads in [1, 3] {
            let config = GraphConfig::default().with_threads(threads);
            let out = ingest_with(&input, 101, IngestOptions::symmetrized(), &config).unwrap();
            assert_eq!(out.graph, reference.graph);
            assert_eq!(out.stats, reference.stats);
        }
    }
}
