//! Construction configuration (worker pool, block sizes)
//!
//! Defaults suit a single multi-core host. Every knob can be overridden from
//! the environment via [`GraphConfig::from_env`], mirroring how OpenMP-style
//! kernels pick up `OMP_NUM_THREADS`.

use crate::error::GraphResult;
use tracing::warn;

/// Prefix-sum block length in elements (1 MiB of `u32`, roughly one L2 cache)
pub const DEFAULT_PREFIX_BLOCK_LEN: usize = 1024 * 1024 / std::mem::size_of::<u32>();

/// Codec read chunk in elements (64 MiB of `u32`)
pub const DEFAULT_READ_CHUNK_LEN: usize = 16 * 1024 * 1024;

/// Vertices handed to a worker at a time in per-vertex parallel loops
pub const DEFAULT_SORT_GRAIN: usize = 64;

/// Environment variable overriding the worker count
pub const ENV_NUM_THREADS: &str = "GKC_NUM_THREADS";

/// Environment variable overriding [`GraphConfig::prefix_block_len`]
pub const ENV_PREFIX_BLOCK_LEN: &str = "GKC_PREFIX_BLOCK_LEN";

/// Environment variable overriding [`GraphConfig::read_chunk_len`]
pub const ENV_READ_CHUNK_LEN: &str = "GKC_READ_CHUNK_LEN";

/// Tuning knobs shared by the codec, ingestion and transpose engine
///
/// None of these affect results: output buffers are identical for any
/// combination of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Dedicated worker count (`None` = global rayon pool, sized to the host)
    pub num_threads: Option<usize>,

    /// Elements per block in the two-level prefix sum
    pub prefix_block_len: usize,

    /// Elements per read call in the binary codec
    pub read_chunk_len: usize,

    /// Minimum vertices per task in per-vertex parallel loops
    pub sort_grain: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            prefix_block_len: DEFAULT_PREFIX_BLOCK_LEN,
            read_chunk_len: DEFAULT_READ_CHUNK_LEN,
            sort_grain: DEFAULT_SORT_GRAIN,
        }
    }
}

impl GraphConfig {
    /// Defaults overridden by `GKC_*` environment variables
    ///
    /// Unparseable or zero values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_usize(ENV_NUM_THREADS) {
            config.num_threads = Some(n);
        }
        if let Some(n) = env_usize(ENV_PREFIX_BLOCK_LEN) {
            config.prefix_block_len = n;
        }
        if let Some(n) = env_usize(ENV_READ_CHUNK_LEN) {
            config.read_chunk_len = n;
        }
        config
    }

    /// Use a dedicated pool of `n` workers
    #[must_use]
    pub const fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Override the prefix-sum block length (clamped to at least 1)
    #[must_use]
    pub fn with_prefix_block_len(mut self, len: usize) -> Self {
        self.prefix_block_len = len.max(1);
        self
    }

    /// Override the codec chunk length (clamped to at least 1)
    #[must_use]
    pub fn with_read_chunk_len(mut self, len: usize) -> Self {
        self.read_chunk_len = len.max(1);
        self
    }

    /// Worker count that parallel phases will see
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(rayon::current_num_threads)
    }

    /// Run `op` on the configured worker pool
    ///
    /// With `num_threads` unset this is a plain call on the global pool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GraphError::ThreadPool`] if a dedicated pool cannot be
    /// started.
    pub fn install<R, F>(&self, op: F) -> GraphResult<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match self.num_threads {
            None => Ok(op()),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                Ok(pool.install(op))
            }
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!(key, value = %raw, "ignoring invalid configuration override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [ENV_NUM_THREADS, ENV_PREFIX_BLOCK_LEN, ENV_READ_CHUNK_LEN] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.num_threads, None);
        assert_eq!(config.prefix_block_len, 256 * 1024);
        assert!(config.read_chunk_len > 0);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var(ENV_NUM_THREADS, "3");
        std::env::set_var(ENV_PREFIX_BLOCK_LEN, "128");

        let config = GraphConfig::from_env();
        assert_eq!(config.num_threads, Some(3));
        assert_eq!(config.prefix_block_len, 128);
        assert_eq!(config.read_chunk_len, DEFAULT_READ_CHUNK_LEN);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        clear_env();
        std::env::set_var(ENV_NUM_THREADS, "lots");
        std::env::set_var(ENV_READ_CHUNK_LEN, "0");

        let config = GraphConfig::from_env();
        assert_eq!(config, GraphConfig::default());

        clear_env();
    }

    #[test]
    fn test_install_dedicated_pool() {
        let config = GraphConfig::default().with_threads(2);
        let seen = config.install(rayon::current_num_threads).unwrap();
        assert_eq!(seen, 2);
        assert_eq!(config.effective_threads(), 2);
    }

    #[test]
    fn test_builders_clamp() {
        let config = GraphConfig::default()
            .with_prefix_block_len(0)
            .with_read_chunk_len(0);
        assert_eq!(config.prefix_block_len, 1);
        assert_eq!(config.read_chunk_len, 1);
    }
}
