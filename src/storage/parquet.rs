//! Parquet edge-list interchange
//!
//! # Format
//!
//! One file, `{path}_edges.parquet`, with columns `(source, target, weight)`
//! (all UInt32) in CSR order. The Arrow schema carries two key-value entries:
//! - `num_vertices`: vertex count (isolated trailing vertices survive)
//! - `weighted`: `"true"` if the weight column holds real weights

use super::CsrGraph;
use crate::algorithms::ingest::{ingest, IngestOptions, Triple};
use anyhow::{anyhow, Context, Result};
use arrow::array::UInt32Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const NUM_VERTICES_KEY: &str = "num_vertices";
const WEIGHTED_KEY: &str = "weighted";

fn edges_path(base_path: &Path) -> String {
    format!("{}_edges.parquet", base_path.display())
}

fn u32_column<'a>(batch: &'a RecordBatch, index: usize, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<UInt32Array>()
        .with_context(|| format!("Invalid {name} column type"))
}

impl CsrGraph {
    /// Write the edge list to `{path}_edges.parquet`
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let edges_path = edges_path(path.as_ref());

        let mut sources = Vec::with_capacity(self.num_edges());
        let mut targets = Vec::with_capacity(self.num_edges());
        let mut weights = Vec::with_capacity(self.num_edges());
        for (src, dst, weight) in self.iter_edges() {
            sources.push(src);
            targets.push(dst);
            weights.push(weight);
        }

        let metadata = HashMap::from([
            (NUM_VERTICES_KEY.to_string(), self.num_nodes().to_string()),
            (WEIGHTED_KEY.to_string(), self.is_weighted().to_string()),
        ]);
        let schema = Arc::new(Schema::new_with_metadata(
            vec![
                Field::new("source", DataType::UInt32, false),
                Field::new("target", DataType::UInt32, false),
                Field::new("weight", DataType::UInt32, false),
            ],
            metadata,
        ));

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(UInt32Array::from(sources)),
                Arc::new(UInt32Array::from(targets)),
                Arc::new(UInt32Array::from(weights)),
            ],
        )
        .context("Failed to create RecordBatch")?;

        let file =
            File::create(&edges_path).with_context(|| format!("Failed to create {edges_path}"))?;

        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::ZSTD(
                parquet::basic::ZstdLevel::try_new(3)?,
            ))
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        info!(path = %edges_path, edges = batch.num_rows(), "wrote parquet edge list");
        Ok(())
    }

    /// Read a graph written by [`CsrGraph::write_parquet`]
    ///
    /// Edges are re-ingested (range-checked, sorted, deduplicated, self-loops
    /// dropped) without symmetrization.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, lacks the metadata, or holds
    /// out-of-range edges
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let edges_path = edges_path(path.as_ref());
        let file =
            File::open(&edges_path).with_context(|| format!("Failed to open {edges_path}"))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let metadata = builder.schema().metadata().clone();
        let num_vertices: usize = metadata
            .get(NUM_VERTICES_KEY)
            .ok_or_else(|| anyhow!("{edges_path} has no {NUM_VERTICES_KEY} metadata"))?
            .parse()
            .with_context(|| format!("Invalid {NUM_VERTICES_KEY} in {edges_path}"))?;
        let weighted = metadata.get(WEIGHTED_KEY).is_some_and(|v| v == "true");

        let mut triples = Vec::new();
        for batch_result in builder.build()? {
            let batch: RecordBatch = batch_result?;
            let sources = u32_column(&batch, 0, "source")?;
            let targets = u32_column(&batch, 1, "target")?;
            let weights = u32_column(&batch, 2, "weight")?;

            triples.extend(
                (0..batch.num_rows())
                    .map(|i| Triple::new(sources.value(i), targets.value(i), weights.value(i))),
            );
        }

        let graph = ingest(&triples, num_vertices, IngestOptions::directed())
            .with_context(|| format!("Invalid edge list in {edges_path}"))?
            .graph;
        Ok(if weighted { graph } else { graph.without_weights() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NodeId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_parquet_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_graph");

        // 0 → 1, 0 → 2, 1 → 2, vertex 3 isolated
        let graph =
            CsrGraph::from_parts(&[0, 2, 3, 3, 3], &[1, 2, 2], Some(&[1, 2, 3])).unwrap();
        graph.write_parquet(&path).await.unwrap();

        let loaded = CsrGraph::read_parquet(&path).await.unwrap();
        assert_eq!(loaded, graph);
        assert_eq!(loaded.num_nodes(), 4);
        assert_eq!(loaded.outgoing_weights(NodeId(0)).unwrap(), Some(&[1, 2][..]));
    }

    #[tokio::test]
    async fn test_unweighted_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain");

        let graph = CsrGraph::from_parts(&[0, 1, 2], &[1, 0], None).unwrap();
        graph.write_parquet(&path).await.unwrap();

        let loaded = CsrGraph::read_parquet(&path).await.unwrap();
        assert!(!loaded.is_weighted());
        assert_eq!(loaded, graph);
    }

    #[tokio::test]
    async fn test_empty_graph_parquet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty_graph");

        let graph = CsrGraph::from_parts(&[0], &[], None).unwrap();
        graph.write_parquet(&path).await.unwrap();

        let loaded = CsrGraph::read_parquet(&path).await.unwrap();
        assert_eq!(loaded.num_nodes(), 0);
        assert_eq!(loaded.num_edges(), 0);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = CsrGraph::read_parquet(dir.path().join("absent")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
