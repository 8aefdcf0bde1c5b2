//! Error types for the header sync engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the crate and the command-line tool.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Logging-related errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] io::Error),

    #[error("Subscriber initialization failed: {0}")]
    SubscriberInit(String),

    #[error("Log rotation failed: {0}")]
    RotationFailed(String),
}

/// Errors raised while decoding or verifying headers.
///
/// Everything except `MalformedHeader` means a peer offered a chain we must
/// not persist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed header: expected 80 bytes, got {length}")]
    MalformedHeader {
        length: usize,
    },

    #[error("Header at height {height} does not link to its predecessor")]
    LinkageMismatch {
        height: u32,
    },

    #[error("Header at height {height} has bits {found:#010x}, expected {expected:#010x}")]
    BitsMismatch {
        height: u32,
        expected: u32,
        found: u32,
    },

    #[error("Header at height {height} does not meet its target")]
    InsufficientWork {
        height: u32,
    },

    #[error("Difficulty oracle returned no target for height {height}")]
    MissingTarget {
        height: u32,
    },

    #[error("Headers extend past the maximum height")]
    HeightOverflow,
}

impl ValidationError {
    /// Height of the offending header, if the error is tied to one.
    pub fn height(&self) -> Option<u32> {
        match self {
            ValidationError::MalformedHeader {
                ..
            }
            | ValidationError::HeightOverflow => None,
            ValidationError::LinkageMismatch {
                height,
            }
            | ValidationError::BitsMismatch {
                height,
                ..
            }
            | ValidationError::InsufficientWork {
                height,
            }
            | ValidationError::MissingTarget {
                height,
            } => Some(*height),
        }
    }
}

/// Storage-related errors. All of them are fatal to the sync loop.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Header store {path:?} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Data directory locked: {0}")]
    DirectoryLocked(String),

    /// Chunk `index` reaches past the largest representable height.
    #[error("Chunk {index} reaches past the maximum height")]
    ChunkOutOfRange {
        index: u32,
    },

    /// A write would leave a hole of unwritten records below `height`.
    #[error("Write at height {height} would skip past the next free height {next}")]
    OutOfOrderWrite {
        height: u32,
        next: u32,
    },
}

/// Errors from the peer request/response rendezvous. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Timeout occurred")]
    Timeout,

    #[error("Peer disconnected")]
    PeerDisconnected,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request cancelled by shutdown")]
    Cancelled,
}

/// Synchronization-related errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A fixed-size batch failed verification; nothing from it was written.
    #[error("Chunk {index} failed verification: {source}")]
    ChunkVerificationFailed {
        index: u32,
        #[source]
        source: ValidationError,
    },

    /// Walk-back requested more ancestors than allowed without reconnecting.
    #[error("Reorg too deep: walked back {depth} headers, limit is {max}")]
    ReorgTooDeep {
        depth: u32,
        max: u32,
    },

    /// A peer announced a height whose chunk range does not fit in `u32`.
    #[error("Announced height {height} is out of range")]
    HeightOutOfRange {
        height: u32,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Indicates an invalid state in the engine lifecycle (e.g. started twice)
    #[error("Invalid sync state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Storage failures leave the store in an unknown state and must stop the
    /// engine. Everything else only aborts the current attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }

    /// Returns a static string representing the error category based on the variant
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::ChunkVerificationFailed {
                ..
            }
            | SyncError::Validation(_) => "validation",
            SyncError::ReorgTooDeep {
                ..
            } => "reorg",
            SyncError::HeightOutOfRange {
                ..
            } => "announcement",
            SyncError::Network(NetworkError::Timeout) => "timeout",
            SyncError::Network(_) => "network",
            SyncError::Storage(_) => "storage",
            SyncError::InvalidState(_) => "state",
            SyncError::Config(_) => "config",
        }
    }
}

/// Type alias for Result with the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Type alias for storage operation results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Type alias for validation operation results.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Type alias for network operation results.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Type alias for sync operation results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Type alias for logging operation results.
pub type LoggingResult<T> = std::result::Result<T, LoggingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_errors_are_fatal() {
        let storage = SyncError::Storage(StorageError::Corruption("bad".to_string()));
        assert!(storage.is_fatal());

        let timeout = SyncError::Network(NetworkError::Timeout);
        assert!(!timeout.is_fatal());
        assert_eq!(timeout.category(), "timeout");

        let chunk = SyncError::ChunkVerificationFailed {
            index: 3,
            source: ValidationError::InsufficientWork {
                height: 6050,
            },
        };
        assert!(!chunk.is_fatal());
        assert_eq!(chunk.category(), "validation");
    }

    #[test]
    fn test_validation_error_height() {
        assert_eq!(
            ValidationError::BitsMismatch {
                height: 7,
                expected: 1,
                found: 2
            }
            .height(),
            Some(7)
        );
        assert_eq!(
            ValidationError::MalformedHeader {
                length: 79
            }
            .height(),
            None
        );
        assert_eq!(ValidationError::HeightOverflow.height(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = ValidationError::BitsMismatch {
            height: 12,
            expected: 0x1b04864c,
            found: 0x1d00ffff,
        };
        assert_eq!(
            err.to_string(),
            "Header at height 12 has bits 0x1d00ffff, expected 0x1b04864c"
        );

        let err = SyncError::ReorgTooDeep {
            depth: 101,
            max: 100,
        };
        assert_eq!(err.to_string(), "Reorg too deep: walked back 101 headers, limit is 100");
    }
}
