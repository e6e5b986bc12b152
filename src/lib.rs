//! gkc-graph: cache-aligned CSR/CSC graph construction
//!
//! # Overview
//!
//! gkc-graph builds the shared sparse-graph representation consumed by
//! parallel graph-analytics kernels (BFS, SSSP, betweenness centrality,
//! connected components, `PageRank`, triangle counting). It covers ingestion
//! of edge lists, the length-prefixed binary file format, 64-byte aligned
//! buffers, and a lock-free parallel CSR → CSC transpose.
//!
//! # Quick Start
//!
//! ```
//! use gkc_graph::algorithms::{ingest, IngestOptions, Triple};
//! use gkc_graph::NodeId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Build a CSR graph from an edge list
//! let edges = [Triple::new(0, 1, 4), Triple::new(0, 2, 1), Triple::new(1, 2, 7)];
//! let graph = ingest(&edges, 3, IngestOptions::directed())?.graph;
//!
//! // Query neighbors (O(1) via CSR indexing)
//! assert_eq!(graph.outgoing_neighbors(NodeId(0))?, &[1, 2]);
//!
//! // Derive the CSC form in parallel
//! let csc = graph.transpose()?;
//! assert_eq!(csc.incoming_neighbors(NodeId(2))?, &[0, 1]);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: [`AlignedBuffer`]-backed [`CsrGraph`]/[`CscGraph`], binary
//!   codec ([`storage::codec`]), Matrix-Market conversion, Parquet interchange
//! - **Algorithms**: ingestion, transpose, lower-triangular and centered CSR
//! - **Parallelism**: rayon data-parallel phases, atomics instead of locks;
//!   results never depend on the worker count ([`GraphConfig`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod broom;
pub mod config;
pub mod error;
pub mod storage;

// Re-export core types
pub use algorithms::{
    csr_to_center_csr, csr_to_lower, ingest, transpose, CenteredCsr, IngestOptions, Ingested,
    SymmetryDiagnostic, Triple,
};
pub use config::GraphConfig;
pub use error::{GraphError, GraphResult};
pub use storage::{AlignedBuffer, CscGraph, CsrGraph, GraphFiles, NodeId};

// Error type
pub use anyhow::{Error, Result};
