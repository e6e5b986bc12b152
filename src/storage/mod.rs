//! Graph storage layer
//!
//! Aligned buffers, CSR/CSC graph types, the length-prefixed binary codec,
//! Matrix-Market conversion, source lists and Parquet interchange.

pub mod aligned;
pub mod codec;
pub mod csr;
pub mod mtx;
#[cfg(feature = "storage")]
pub mod parquet;
pub mod sources;

pub use aligned::{alloc_neighbors, alloc_offsets, AlignedBuffer, CACHE_LINE};
pub use codec::GraphFiles;
pub use csr::{CscGraph, CsrGraph, NodeId};
pub use mtx::{ConversionReport, MatrixMarketHeader};
