//! Source-vertex lists handed to traversal kernels
//!
//! A `.sources` file is plain text with one 0-indexed vertex id per line.

use crate::error::{GraphError, GraphResult};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Vertex used when no valid source is given
pub const DEFAULT_SOURCE: u32 = 0;

/// `<base>.sources`
pub fn sources_path(base: impl AsRef<Path>) -> PathBuf {
    let mut name = OsString::from(base.as_ref().as_os_str());
    name.push(".sources");
    PathBuf::from(name)
}

/// Read source ids for a graph of `num_vertices` vertices
///
/// Ids `>= num_vertices` are skipped with a warning; blank lines are
/// ignored. An empty result becomes `[0]`.
///
/// # Errors
///
/// Returns [`GraphError::Io`] if the file cannot be read and
/// [`GraphError::Malformed`] for a line that is not an unsigned integer.
pub fn read_sources(path: impl AsRef<Path>, num_vertices: usize) -> GraphResult<Vec<u32>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| GraphError::io(path, e))?;

    let mut sources = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| GraphError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id: u32 = line.parse().map_err(|_| {
            GraphError::Malformed(format!(
                "{}:{}: invalid source id {line:?}",
                path.display(),
                lineno + 1
            ))
        })?;
        if id as usize >= num_vertices {
            warn!(source = id, num_vertices, "skipping out-of-range source");
            continue;
        }
        sources.push(id);
    }

    if sources.is_empty() {
        warn!("no sources provided, using vertex {DEFAULT_SOURCE}");
        sources.push(DEFAULT_SOURCE);
    }
    info!(count = sources.len(), path = %path.display(), "read sources");
    Ok(sources)
}

/// Validate a single requested source, falling back to vertex 0
#[must_use]
pub fn resolve_source(requested: u32, num_vertices: usize) -> u32 {
    if (requested as usize) < num_vertices {
        requested
    } else {
        warn!(source = requested, num_vertices, "source does not exist, using vertex {DEFAULT_SOURCE}");
        DEFAULT_SOURCE
    }
}

/// Convert 1-indexed ids (as stored in Matrix-Market vectors) to 0-indexed
///
/// Values are truncated toward zero first, since such files often store ids
/// as reals.
///
/// # Errors
///
/// Returns [`GraphError::Malformed`] for a value below 1 or above `u32::MAX`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn from_one_indexed<I>(values: I) -> GraphResult<Vec<u32>>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .map(|raw| {
            let id = raw.trunc();
            if (1.0..=f64::from(u32::MAX)).contains(&id) {
                Ok(id as u32 - 1)
            } else {
                Err(GraphError::Malformed(format!("invalid 1-indexed vertex id {raw}")))
            }
        })
        .collect()
}

/// Write `sources` to `<base>.sources`, returning the path
///
/// # Errors
///
/// Returns [`GraphError::Io`] if the file cannot be written.
pub fn write_sources(base: impl AsRef<Path>, sources: &[u32]) -> GraphResult<PathBuf> {
    let path = sources_path(base);
    let file = File::create(&path).map_err(|e| GraphError::io(&path, e))?;
    let mut out = BufWriter::new(file);
    for id in sources {
        writeln!(out, "{id}").map_err(|e| GraphError::io(&path, e))?;
    }
    out.flush().map_err(|e| GraphError::io(&path, e))?;
    info!(count = sources.len(), path = %path.display(), "wrote sources");
    Ok(path)
}
