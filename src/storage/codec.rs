//! Length-prefixed binary encoding of `u32` arrays
//!
//! # Format
//!
//! ```text
//! [count: u32 LE][v0: u32 LE][v1: u32 LE] ... [v{count-1}: u32 LE]
//! ```
//!
//! A graph is three such files (see [`GraphFiles`]): offsets (`IA`, N + 1
//! entries), neighbors (`JA`, M entries) and optional weights (`WA`, M entries).

use super::aligned::AlignedBuffer;
use super::csr::CsrGraph;
use crate::config::{GraphConfig, DEFAULT_READ_CHUNK_LEN};
use crate::error::{to_u32, GraphError, GraphResult};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

const PREFIX_BYTES: u64 = 4;

fn open(path: &Path) -> GraphResult<(File, u64)> {
    let file = File::open(path).map_err(|e| GraphError::io(path, e))?;
    let len = file.metadata().map_err(|e| GraphError::io(path, e))?.len();
    Ok((file, len))
}

fn read_prefix(file: &mut File, path: &Path, file_len: u64) -> GraphResult<u32> {
    let mut prefix = [0_u8; 4];
    file.read_exact(&mut prefix).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => GraphError::Truncated {
            path: path.to_path_buf(),
            expected: PREFIX_BYTES,
            actual: file_len,
        },
        _ => GraphError::io(path, e),
    })?;
    Ok(u32::from_le_bytes(prefix))
}

/// Element count declared by a file's 4-byte prefix
///
/// # Errors
///
/// Returns [`GraphError::Io`] if the file cannot be opened and
/// [`GraphError::Truncated`] if it holds fewer than 4 bytes.
pub fn size_of(path: impl AsRef<Path>) -> GraphResult<u32> {
    let path = path.as_ref();
    let (mut file, len) = open(path)?;
    read_prefix(&mut file, path, len)
}

/// Read a file into `buffer` in chunks of the default length
///
/// Returns the element count.
///
/// # Errors
///
/// See [`read_into_chunked`].
pub fn read_into(path: impl AsRef<Path>, buffer: &mut [u32]) -> GraphResult<usize> {
    read_into_chunked(path, buffer, DEFAULT_READ_CHUNK_LEN)
}

/// Read a file into the front of `buffer`, `chunk_len` elements per read call
///
/// Returns the element count. The chunk length only bounds the size of each
/// read; it never changes the result.
///
/// # Errors
///
/// - [`GraphError::Io`] if the file cannot be opened or read
/// - [`GraphError::Truncated`] if the file is shorter than its prefix declares
/// - [`GraphError::CountMismatch`] if it carries bytes beyond the declared count
/// - [`GraphError::BufferTooSmall`] if `buffer` cannot hold the declared count
pub fn read_into_chunked(
    path: impl AsRef<Path>,
    buffer: &mut [u32],
    chunk_len: usize,
) -> GraphResult<usize> {
    let path = path.as_ref();
    let (mut file, file_len) = open(path)?;
    let count = read_prefix(&mut file, path, file_len)?;
    let expected = PREFIX_BYTES + u64::from(count) * 4;

    if file_len < expected {
        return Err(GraphError::Truncated {
            path: path.to_path_buf(),
            expected,
            actual: file_len,
        });
    }
    if file_len != expected {
        return Err(GraphError::CountMismatch {
            path: path.to_path_buf(),
            declared: u64::from(count),
            actual: (file_len - PREFIX_BYTES) / 4,
        });
    }

    let count = count as usize;
    if buffer.len() < count {
        return Err(GraphError::BufferTooSmall {
            needed: count,
            capacity: buffer.len(),
        });
    }

    for chunk in buffer[..count].chunks_mut(chunk_len.max(1)) {
        file.read_exact(bytemuck::cast_slice_mut(chunk))
            .map_err(|e| GraphError::io(path, e))?;
        if cfg!(target_endian = "big") {
            for v in chunk.iter_mut() {
                *v = u32::from_le(*v);
            }
        }
    }
    Ok(count)
}

/// Read a whole file into a fresh aligned buffer
///
/// # Errors
///
/// See [`read_into_chunked`]; also [`GraphError::OutOfMemory`].
pub fn read(path: impl AsRef<Path>) -> GraphResult<AlignedBuffer<u32>> {
    read_with(path, DEFAULT_READ_CHUNK_LEN)
}

/// [`read`] with an explicit chunk length
///
/// # Errors
///
/// See [`read_into_chunked`]; also [`GraphError::OutOfMemory`].
pub fn read_with(path: impl AsRef<Path>, chunk_len: usize) -> GraphResult<AlignedBuffer<u32>> {
    let path = path.as_ref();
    let start = Instant::now();
    let count = size_of(path)?;
    let mut buffer = AlignedBuffer::zeroed(count as usize)?;
    read_into_chunked(path, &mut buffer, chunk_len)?;
    debug!(path = %path.display(), count, elapsed = ?start.elapsed(), "read binary array");
    Ok(buffer)
}

/// Write `values` with a count prefix
///
/// # Errors
///
/// Returns [`GraphError::TooLarge`] if `values` has more than `u32::MAX`
/// entries and [`GraphError::Io`] if the file cannot be written.
pub fn write(path: impl AsRef<Path>, values: &[u32]) -> GraphResult<()> {
    let path = path.as_ref();
    let count = to_u32("element count", values.len())?;
    let file = File::create(path).map_err(|e| GraphError::io(path, e))?;
    let mut out = BufWriter::new(file);

    let io = |e| GraphError::io(path, e);
    out.write_all(&count.to_le_bytes()).map_err(io)?;
    if cfg!(target_endian = "little") {
        out.write_all(bytemuck::cast_slice(values)).map_err(io)?;
    } else {
        for v in values {
            out.write_all(&v.to_le_bytes()).map_err(io)?;
        }
    }
    out.flush().map_err(io)?;
    debug!(path = %path.display(), count, "wrote binary array");
    Ok(())
}

/// Paths of the offsets, neighbors and (optional) weights files of one graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFiles {
    /// `IA` file (N + 1 entries)
    pub offsets: PathBuf,
    /// `JA` file (M entries)
    pub neighbors: PathBuf,
    /// `WA` file (M entries), if the graph is weighted
    pub weights: Option<PathBuf>,
}

impl GraphFiles {
    /// Unweighted graph files
    pub fn new(offsets: impl Into<PathBuf>, neighbors: impl Into<PathBuf>) -> Self {
        Self {
            offsets: offsets.into(),
            neighbors: neighbors.into(),
            weights: None,
        }
    }

    /// Add a weights file
    #[must_use]
    pub fn with_weights(mut self, weights: impl Into<PathBuf>) -> Self {
        self.weights = Some(weights.into());
        self
    }

    /// Drop the weights file
    #[must_use]
    pub fn without_weights(mut self) -> Self {
        self.weights = None;
        self
    }

    /// `<base>_ia.bin`, `<base>_ja.bin`, `<base>_va.bin`
    pub fn from_basename(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref().as_os_str();
        let suffixed = |suffix: &str| {
            let mut name = base.to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self::new(suffixed("_ia.bin"), suffixed("_ja.bin")).with_weights(suffixed("_va.bin"))
    }

    /// Vertex count (offsets entries − 1)
    ///
    /// # Errors
    ///
    /// I/O errors from [`size_of`], or [`GraphError::Malformed`] for an
    /// empty offsets file.
    pub fn vertex_count(&self) -> GraphResult<usize> {
        let entries = size_of(&self.offsets)?;
        entries
            .checked_sub(1)
            .map(|n| n as usize)
            .ok_or_else(|| GraphError::Malformed(format!("{} is empty", self.offsets.display())))
    }

    /// Edge count (neighbors entries)
    ///
    /// # Errors
    ///
    /// I/O errors from [`size_of`].
    pub fn edge_count(&self) -> GraphResult<usize> {
        size_of(&self.neighbors).map(|m| m as usize)
    }
}

fn check_weights(files: &GraphFiles, edges: usize, weights: &AlignedBuffer<u32>) -> GraphResult<()> {
    match &files.weights {
        Some(path) if weights.len() != edges => Err(GraphError::CountMismatch {
            path: path.clone(),
            declared: edges as u64,
            actual: weights.len() as u64,
        }),
        _ => Ok(()),
    }
}

impl CsrGraph {
    /// Load a graph from its binary files
    ///
    /// The arrays are validated before the graph is returned: offsets start
    /// at 0 and never decrease, `IA[N] == |JA|`, `|WA| == |JA|` and every
    /// neighbor id is below N.
    ///
    /// # Errors
    ///
    /// I/O errors from the codec, [`GraphError::CountMismatch`] if the
    /// weights file disagrees with the neighbors file and
    /// [`GraphError::Malformed`] if the arrays violate a CSR invariant.
    pub fn load(files: &GraphFiles, config: &GraphConfig) -> GraphResult<Self> {
        let start = Instant::now();
        let chunk = config.read_chunk_len;
        let row_offsets = read_with(&files.offsets, chunk)?;
        let col_indices = read_with(&files.neighbors, chunk)?;
        let edge_weights = match &files.weights {
            Some(path) => {
                let weights = read_with(path, chunk)?;
                check_weights(files, col_indices.len(), &weights)?;
                Some(weights)
            }
            None => None,
        };

        let graph = config.install(|| Self::from_buffers(row_offsets, col_indices, edge_weights))??;
        info!(
            vertices = graph.num_nodes(),
            edges = graph.num_edges(),
            weighted = graph.is_weighted(),
            elapsed = ?start.elapsed(),
            "loaded graph"
        );
        Ok(graph)
    }

    /// Write the graph to its binary files
    ///
    /// Weights are written only when both the graph carries them and
    /// `files.weights` names a path.
    ///
    /// # Errors
    ///
    /// I/O errors from [`write`].
    pub fn store(&self, files: &GraphFiles) -> GraphResult<()> {
        let (ia, ja, wa) = self.csr_components();
        write(&files.offsets, ia)?;
        write(&files.neighbors, ja)?;
        if let (Some(path), Some(wa)) = (&files.weights, wa) {
            write(path, wa)?;
        }
        Ok(())
    }

    /// Load a graph on the blocking pool, reading the files concurrently
    ///
    /// # Errors
    ///
    /// Returns error if any file fails to load or the arrays are inconsistent
    pub async fn read_binary(files: &GraphFiles, config: &GraphConfig) -> Result<Self> {
        let chunk = config.read_chunk_len;
        let spawn = move |path: PathBuf| {
            tokio::task::spawn_blocking(move || {
                read_with(&path, chunk).with_context(|| format!("Failed to read {}", path.display()))
            })
        };

        let offsets = spawn(files.offsets.clone());
        let neighbors = spawn(files.neighbors.clone());
        let weights = files.weights.clone().map(spawn);

        let row_offsets = offsets.await.context("Offsets reader panicked")??;
        let col_indices = neighbors.await.context("Neighbors reader panicked")??;
        let edge_weights = match weights {
            Some(handle) => {
                let weights = handle.await.context("Weights reader panicked")??;
                check_weights(files, col_indices.len(), &weights)?;
                Some(weights)
            }
            None => None,
        };

        Self::from_buffers(row_offsets, col_indices, edge_weights)
            .context("Graph files are inconsistent")
    }

    /// Async counterpart of [`CsrGraph::store`]
    ///
    /// # Errors
    ///
    /// Returns error if any file cannot be written
    #[allow(clippy::unused_async)] // Mirrors read_binary for callers on a runtime
    pub async fn write_binary(&self, files: &GraphFiles) -> Result<()> {
        self.store(files)
            .with_context(|| format!("Failed to write graph to {}", files.offsets.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csr::NodeId;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip_chunk_sizes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("values.bin");
        let values: Vec<u32> = (0..1000_u32).map(|i| i.wrapping_mul(2_654_435_761)).collect();
        write(&path, &values).unwrap();

        assert_eq!(size_of(&path).unwrap(), 1000);
        for chunk in [1, 3, 64, 1000, 4096] {
            let mut buf = vec![0_u32; 1000];
            assert_eq!(read_into_chunked(&path, &mut buf, chunk).unwrap(), 1000);
            assert_eq!(buf, values, "chunk={chunk}");
        }
    }

    #[test]
    fn test_byte_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.bin");
        write(&path, &[1, 0x0102_0304]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![2, 0, 0, 0, 1, 0, 0, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_empty_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        write(&path, &[]).unwrap();
        assert_eq!(size_of(&path).unwrap(), 0);
        assert!(read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = size_of(dir.path().join("nope.bin")).unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }

    #[test]
    fn test_short_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [1_u8, 0]).unwrap();
        let err = size_of(&path).unwrap_err();
        assert!(matches!(err, GraphError::Truncated { expected: 4, actual: 2, .. }));
    }

    #[test]
    fn test_truncated_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trunc.bin");
        std::fs::write(&path, [3_u8, 0, 0, 0, 1, 0, 0, 0]).unwrap();
        let mut buf = vec![0; 3];
        let err = read_into(&path, &mut buf).unwrap_err();
        assert!(matches!(err, GraphError::Truncated { expected: 16, actual: 8, .. }));
        assert!(err.is_io());
    }

    #[test]
    fn test_trailing_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.bin");
        std::fs::write(&path, [1_u8, 0, 0, 0, 7, 0, 0, 0, 8, 0, 0, 0]).unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(
            err,
            GraphError::CountMismatch {
                declared: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_buffer_too_small() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.bin");
        write(&path, &[1, 2, 3]).unwrap();
        let mut buf = vec![0; 2];
        let err = read_into(&path, &mut buf).unwrap_err();
        assert!(matches!(err, GraphError::BufferTooSmall { needed: 3, capacity: 2 }));
    }

    #[test]
    fn test_graph_files_basename() {
        let files = GraphFiles::from_basename("/data/road");
        assert_eq!(files.offsets, PathBuf::from("/data/road_ia.bin"));
        assert_eq!(files.neighbors, PathBuf::from("/data/road_ja.bin"));
        assert_eq!(files.weights, Some(PathBuf::from("/data/road_va.bin")));
        assert_eq!(files.without_weights().weights, None);
    }

    #[test]
    fn test_store_load_graph() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("g"));
        let graph = CsrGraph::from_parts(&[0, 2, 3, 3], &[1, 2, 2], Some(&[5, 6, 7])).unwrap();
        graph.store(&files).unwrap();

        assert_eq!(files.vertex_count().unwrap(), 3);
        assert_eq!(files.edge_count().unwrap(), 3);

        let loaded = CsrGraph::load(&files, &GraphConfig::default().with_read_chunk_len(2)).unwrap();
        assert_eq!(loaded, graph);

        let unweighted = CsrGraph::load(&files.clone().without_weights(), &GraphConfig::default()).unwrap();
        assert!(!unweighted.is_weighted());
        assert_eq!(unweighted.outgoing_neighbors(NodeId(0)).unwrap(), &[1, 2]);
    }

    #[test]
    fn test_load_rejects_inconsistent_files() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("bad"));
        write(&files.offsets, &[0, 1, 2]).unwrap();
        write(&files.neighbors, &[1, 0]).unwrap();
        write(files.weights.as_ref().unwrap(), &[9]).unwrap();
        let err = CsrGraph::load(&files, &GraphConfig::default()).unwrap_err();
        assert!(matches!(err, GraphError::CountMismatch { declared: 2, actual: 1, .. }));

        write(&files.neighbors, &[1, 5]).unwrap();
        let err = CsrGraph::load(&files.clone().without_weights(), &GraphConfig::default()).unwrap_err();
        assert!(matches!(err, GraphError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("async"));
        let graph = CsrGraph::from_parts(&[0, 1, 2], &[1, 0], Some(&[4, 4])).unwrap();
        graph.write_binary(&files).await.unwrap();

        let loaded = CsrGraph::read_binary(&files, &GraphConfig::default()).await.unwrap();
        assert_eq!(loaded, graph);
    }

    #[tokio::test]
    async fn test_async_missing_file() {
        let dir = tempdir().unwrap();
        let files = GraphFiles::from_basename(dir.path().join("missing"));
        let err = CsrGraph::read_binary(&files, &GraphConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
