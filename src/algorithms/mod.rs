//! Graph construction algorithms (ingestion, transpose, derived layouts)
//!
//! Every routine here is data-parallel over vertices or edges via rayon and
//! produces output that does not depend on the worker count.

pub mod ingest;
pub mod transform;
pub mod transpose;

pub use ingest::{ingest, ingest_with, IngestOptions, IngestStats, Ingested, SymmetryDiagnostic, Triple};
pub use transform::{csr_to_center_csr, csr_to_lower, CenteredCsr};
pub use transpose::{
    exclusive_prefix_sum, sort_neighborhoods, sort_weighted_neighborhoods, transpose,
    transpose_sequential, transpose_with,
};
