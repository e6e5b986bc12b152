//! Error taxonomy for graph construction
//!
//! Three families matter to callers:
//! - I/O failures (`Io`, `Truncated`, `CountMismatch`): missing files, short
//!   reads, or files whose length disagrees with their count prefix
//! - `OutOfMemory`: an aligned buffer could not be allocated
//! - input validation (`VertexOutOfRange`, `Malformed`, `TooLarge`) raised by the
//!   stages that first see untrusted data (ingestion, whole-graph loads)

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for graph construction operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors raised while building, loading or storing graph buffers
#[derive(Debug, Error)]
pub enum GraphError {
    /// File could not be opened, read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// File ended before the expected number of bytes
    #[error("{} is truncated: expected {expected} bytes, found {actual}", path.display())]
    Truncated {
        /// File being read
        path: PathBuf,
        /// Bytes required
        expected: u64,
        /// Bytes present
        actual: u64,
    },

    /// Count prefix disagrees with the file length or a companion file
    #[error("{} declares {declared} entries but {actual} are present", path.display())]
    CountMismatch {
        /// File being read
        path: PathBuf,
        /// Entries named by the count prefix (or expected by the caller)
        declared: u64,
        /// Entries actually available
        actual: u64,
    },

    /// Caller-provided buffer cannot hold the file contents
    #[error("buffer holds {capacity} entries but {needed} are required")]
    BufferTooSmall {
        /// Entries to be written
        needed: usize,
        /// Entries available in the buffer
        capacity: usize,
    },

    /// Aligned allocation failed
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory {
        /// Padded allocation size
        bytes: usize,
    },

    /// Edge endpoint outside `[0, num_vertices)`
    #[error("edge ({row}, {col}) out of range for {num_vertices} vertices")]
    VertexOutOfRange {
        /// Source vertex
        row: u64,
        /// Destination vertex
        col: u64,
        /// Vertex count of the graph being built
        num_vertices: u64,
    },

    /// Quantity does not fit the 32-bit on-disk or in-memory encoding
    #[error("{what} ({value}) exceeds the 32-bit encoding limit")]
    TooLarge {
        /// What overflowed
        what: &'static str,
        /// Offending value
        value: u64,
    },

    /// CSR arrays violate a structural invariant
    #[error("malformed graph: {0}")]
    Malformed(String),

    /// Dedicated worker pool could not be started
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Parquet encoding or decoding failed
    #[cfg(feature = "storage")]
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow conversion failed
    #[cfg(feature = "storage")]
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl GraphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the I/O family (missing, truncated or inconsistent files)
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Truncated { .. } | Self::CountMismatch { .. }
        )
    }
}

/// Narrow a length or id to `u32`, reporting what overflowed
pub(crate) fn to_u32(what: &'static str, value: usize) -> GraphResult<u32> {
    u32::try_from(value).map_err(|_| GraphError::TooLarge {
        what,
        value: value as u64,
    })
}
