//! Configuration for the header sync engine.

use std::path::PathBuf;
use std::time::Duration;

/// File name of the header store inside `storage_path`.
pub const HEADERS_FILE_NAME: &str = "blockchain_headers";

/// Headers per chunk (one difficulty period).
pub const DEFAULT_CHUNK_SIZE: u32 = 2016;

/// Gap above which the engine downloads whole chunks instead of walking back.
pub const DEFAULT_BULK_THRESHOLD: u32 = 50;

/// Headers kept in memory for difficulty window lookups.
pub const DEFAULT_CACHE_KGW_SIZE: usize = 24;

/// Last height at which raw X11 proof of work is compared against the target.
pub const DEFAULT_POW_CHECKPOINT_HEIGHT: u32 = 68_589;

/// Configuration for the header sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding the header store. Defaults to ./dash-headers-data
    pub storage_path: PathBuf,

    /// Headers per chunk.
    pub chunk_size: u32,

    /// Announcements more than this many headers ahead trigger chunk sync.
    pub bulk_threshold: u32,

    /// Size of the recent-header cache and of the difficulty window handed to
    /// the oracle.
    pub cache_kgw_size: usize,

    /// Headers at or below this height must satisfy proof of work.
    pub pow_checkpoint_height: u32,

    /// Maximum ancestors requested while looking for a common ancestor.
    pub max_walkback_depth: u32,

    /// Failed chunks tolerated in one bulk sync before it is abandoned.
    pub max_chunk_retries: u32,

    /// How long to wait for a single header or chunk response.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./dash-headers-data"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            bulk_threshold: DEFAULT_BULK_THRESHOLD,
            cache_kgw_size: DEFAULT_CACHE_KGW_SIZE,
            pow_checkpoint_height: DEFAULT_POW_CHECKPOINT_HEIGHT,
            max_walkback_depth: 100,
            max_chunk_retries: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Create a configuration rooted at `storage_path`.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            ..Self::default()
        }
    }

    /// Path of the flat header file.
    pub fn headers_file(&self) -> PathBuf {
        self.storage_path.join(HEADERS_FILE_NAME)
    }

    /// Set storage path.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_bulk_threshold(mut self, threshold: u32) -> Self {
        self.bulk_threshold = threshold;
        self
    }

    pub fn with_cache_kgw_size(mut self, size: usize) -> Self {
        self.cache_kgw_size = size;
        self
    }

    pub fn with_pow_checkpoint_height(mut self, height: u32) -> Self {
        self.pow_checkpoint_height = height;
        self
    }

    pub fn with_max_walkback_depth(mut self, depth: u32) -> Self {
        self.max_walkback_depth = depth;
        self
    }

    pub fn with_max_chunk_retries(mut self, retries: u32) -> Self {
        self.max_chunk_retries = retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.bulk_threshold == 0 {
            return Err("bulk_threshold must be > 0".to_string());
        }

        if self.cache_kgw_size == 0 {
            return Err("cache_kgw_size must be > 0".to_string());
        }

        if self.max_walkback_depth == 0 {
            return Err("max_walkback_depth must be > 0".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout must be non-zero".to_string());
        }

        Ok(())
    }
}
