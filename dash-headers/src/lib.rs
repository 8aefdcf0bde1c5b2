//! Header-chain synchronization and verification for Dash light clients.
//!
//! The crate keeps a local, append-mostly store of 80-byte block headers and
//! brings it up to date with whatever peers announce:
//!
//! - Verify header linkage, difficulty bits and X11 proof of work
//! - Download whole chunks when far behind, walk back to a common ancestor
//!   when a peer is on a short fork
//! - Persist headers in the flat-file format shared with existing stores
//! - Run everything on a single worker task that is the store's only writer
//!
//! # Quick Start
//!
//! ```no_run
//! use dash_headers::storage::FlatFileStore;
//! use dash_headers::sync::HeightEvent;
//! use dash_headers::{HeaderBitsOracle, SyncConfig, SyncEngine};
//! # use dash_headers::network::HeaderNetwork;
//! # async fn run<N: HeaderNetwork + 'static>(network: N) -> Result<(), dash_headers::Error> {
//! let config = SyncConfig::new("./dash-headers-data");
//! let store = FlatFileStore::open_with_config(&config)?;
//! let (heights, mut new_heights) = tokio::sync::mpsc::unbounded_channel::<HeightEvent>();
//!
//! let mut engine = SyncEngine::new(config, store, network, HeaderBitsOracle, heights)?;
//! let announcements = engine.announcement_sender();
//! engine.start()?;
//!
//! // Peer connections call `announcements.announce(peer, height, header)`.
//! # drop(announcements);
//! while let Some(event) = new_heights.recv().await {
//!     println!("synced to {} via {}", event.height, event.peer);
//! }
//!
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub mod config;
pub mod error;
pub mod hashes;
pub mod header;
pub mod logging;
pub mod network;
pub mod storage;
pub mod sync;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use config::SyncConfig;
pub use error::{
    Error, LoggingError, LoggingResult, NetworkError, Result, StorageError, SyncError, SyncResult,
    ValidationError,
};
pub use header::BlockHeader;
pub use logging::{init_console_logging, init_logging, LogFileConfig, LoggingConfig, LoggingGuard};
pub use storage::{FlatFileStore, HeaderStorage, MemoryStore};
pub use sync::{AnnouncementSender, HeightEvent, HeightListener, SyncEngine};
pub use types::{BlockHash, Chain, CompactTarget, PeerId, Target};
pub use validation::{ChainVerifier, ChunkVerifier, DifficultyOracle, HeaderBitsOracle};

// Re-export tracing's level filter so callers need not depend on tracing
pub use tracing::level_filters::LevelFilter;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
