//! Matrix-Market coordinate triples → binary graph files
//!
//! Parsing the text format is left to the caller; this module takes the
//! banner/size information and the 1-indexed `(row, col, value)` entries and
//! produces the `IA`/`JA`/`WA` files.

use super::codec::GraphFiles;
use crate::algorithms::ingest::{ingest_with, IngestOptions, IngestStats, SymmetryDiagnostic, Triple};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Size line and symmetry flag of a coordinate-format file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixMarketHeader {
    /// Declared row count
    pub rows: u64,
    /// Declared column count
    pub cols: u64,
    /// Declared number of stored entries
    pub entries: u64,
    /// Banner says `symmetric` (only one triangle is stored)
    pub symmetric: bool,
}

impl MatrixMarketHeader {
    /// Header of a `general` (non-symmetric) matrix
    #[must_use]
    pub const fn general(rows: u64, cols: u64, entries: u64) -> Self {
        Self {
            rows,
            cols,
            entries,
            symmetric: false,
        }
    }

    /// Header of a `symmetric` matrix
    #[must_use]
    pub const fn symmetric(rows: u64, cols: u64, entries: u64) -> Self {
        Self {
            rows,
            cols,
            entries,
            symmetric: true,
        }
    }

    /// Vertex count of the resulting graph (`max(rows, cols)`)
    #[must_use]
    pub const fn num_vertices(&self) -> u64 {
        if self.rows > self.cols {
            self.rows
        } else {
            self.cols
        }
    }
}

/// Outcome of [`convert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Vertices written
    pub num_vertices: usize,
    /// Edges written
    pub num_edges: usize,
    /// Whether edges were mirrored
    pub symmetrized: bool,
    /// Entries actually supplied (may differ from the header)
    pub entries_read: u64,
    /// Symmetrization note, if any
    pub diagnostic: Option<SymmetryDiagnostic>,
    /// Ingestion counters
    pub stats: IngestStats,
}

/// Convert 1-indexed entries into 0-indexed triples
///
/// Values are truncated toward zero into `u32` (negative and NaN become 0,
/// values above `u32::MAX` saturate).
///
/// # Errors
///
/// Returns [`GraphError::VertexOutOfRange`] for an index of 0 or above
/// `num_vertices` (reported 1-indexed, as it appeared in the input).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_triple(row: u64, col: u64, value: f64, num_vertices: u64) -> GraphResult<Triple> {
    let valid = |i: u64| (1..=num_vertices).contains(&i);
    if !valid(row) || !valid(col) {
        return Err(GraphError::VertexOutOfRange {
            row,
            col,
            num_vertices,
        });
    }
    // Both ids are <= num_vertices, which the caller has checked fits u32.
    Ok(Triple::new((row - 1) as u32, (col - 1) as u32, value as u32))
}

/// Write the graph described by `entries` to `out`
///
/// `symmetrize` defaults to the header's symmetry flag.
///
/// # Errors
///
/// See [`convert_with`].
pub fn convert<I>(
    header: &MatrixMarketHeader,
    entries: I,
    symmetrize: Option<bool>,
    out: &GraphFiles,
) -> Result<ConversionReport>
where
    I: IntoIterator<Item = (u64, u64, f64)>,
{
    convert_with(header, entries, symmetrize, out, &GraphConfig::default())
}

/// [`convert`] on the configured worker pool
///
/// # Errors
///
/// Returns error if the vertex count does not fit `u32`, an entry is out of
/// range, ingestion fails or the files cannot be written.
pub fn convert_with<I>(
    header: &MatrixMarketHeader,
    entries: I,
    symmetrize: Option<bool>,
    out: &GraphFiles,
    config: &GraphConfig,
) -> Result<ConversionReport>
where
    I: IntoIterator<Item = (u64, u64, f64)>,
{
    let n = header.num_vertices();
    let num_vertices = u32::try_from(n)
        .map_err(|_| GraphError::TooLarge {
            what: "vertex count",
            value: n,
        })
        .context("Matrix dimensions exceed the 32-bit graph encoding")? as usize;

    let triples = entries
        .into_iter()
        .enumerate()
        .map(|(i, (row, col, value))| {
            to_triple(row, col, value, n).with_context(|| format!("Invalid entry {}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let entries_read = triples.len() as u64;
    if entries_read != header.entries {
        warn!(
            declared = header.entries,
            read = entries_read,
            "entry count differs from header"
        );
    }

    let options = IngestOptions {
        symmetrize: symmetrize.unwrap_or(header.symmetric),
        declared_symmetric: header.symmetric,
    };
    let ingested = ingest_with(&triples, num_vertices, options, config)
        .context("Failed to build CSR graph")?;

    ingested
        .graph
        .store(out)
        .with_context(|| format!("Failed to write {}", out.offsets.display()))?;

    info!(
        vertices = num_vertices,
        edges = ingested.graph.num_edges(),
        symmetrized = options.symmetrize,
        "converted matrix"
    );

    Ok(ConversionReport {
        num_vertices,
        num_edges: ingested.graph.num_edges(),
        symmetrized: options.symmetrize,
        entries_read,
        diagnostic: ingested.diagnostic,
        stats: ingested.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::codec;
    use tempfile::tempdir;

    #[test]
    fn test_num_vertices() {
        assert_eq!(MatrixMarketHeader::general(3, 5, 0).num_vertices(), 5);
        assert_eq!(MatrixMarketHeader::general(7, 2, 0).num_vertices(), 7);
    }

    #[test]
    fn test_to_triple() {
        assert_eq!(to_triple(1, 2, 3.9, 2).unwrap(), Triple::new(0, 1, 3));
        assert_eq!(to_triple(2, 1, -4.0, 2).unwrap().weight, 0);
        assert!(matches!(
            to_triple(0, 1, 1.0, 2),
            Err(GraphError::VertexOutOfRange { row: 0, .. })
        ));
        assert!(to_triple(1, 3, 1.0, 2).is_err());
    }

    #[test]
    fn test_convert_symmetric_defaults_to_mirroring() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("sym"));
        // Lower triangle of the triangle graph 1-2-3
        let header = MatrixMarketHeader::symmetric(3, 3, 3);
        let entries = [(2, 1, 1.0), (3, 1, 2.0), (3, 2, 3.0)];
        let report = convert(&header, entries, None, &files).unwrap();

        assert!(report.symmetrized);
        assert_eq!(report.num_vertices, 3);
        assert_eq!(report.num_edges, 6);
        assert_eq!(report.diagnostic, Some(SymmetryDiagnostic::RedundantSymmetrize));
        assert_eq!(codec::read(&files.offsets).unwrap().to_vec(), vec![0, 2, 4, 6]);
        assert_eq!(codec::read(&files.neighbors).unwrap().to_vec(), vec![1, 2, 0, 2, 0, 1]);
        assert_eq!(
            codec::read(files.weights.as_ref().unwrap()).unwrap().to_vec(),
            vec![1, 2, 1, 3, 2, 3]
        );
    }

    #[test]
    fn test_convert_override_declines() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("lower"));
        let header = MatrixMarketHeader::symmetric(3, 3, 2);
        let report = convert(&header, [(2, 1, 1.0), (3, 3, 9.0)], Some(false), &files).unwrap();

        assert!(!report.symmetrized);
        assert_eq!(report.num_edges, 1);
        assert_eq!(report.stats.self_loops, 1);
        assert_eq!(report.diagnostic, Some(SymmetryDiagnostic::DeclinedSymmetric));
    }

    #[test]
    fn test_convert_rejects_bad_index() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("bad"));
        let header = MatrixMarketHeader::general(2, 2, 1);
        let err = convert(&header, [(1, 5, 1.0)], None, &files).unwrap_err();
        assert!(err.to_string().contains("Invalid entry 1"));
        assert!(!files.offsets.exists());
    }
}
