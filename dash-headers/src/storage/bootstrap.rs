//! One-shot bootstrap of an empty header store from a snapshot.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Fetches an initial headers file (e.g. from an HTTP mirror) into `dest`.
///
/// Called at most once, only when the store file does not exist. Failure is
/// never fatal: the store then starts empty and syncs from peers.
#[async_trait]
pub trait BootstrapLoader: Send + Sync {
    /// Human-readable origin of the snapshot, for logs.
    fn describe(&self) -> String;

    /// Writes the snapshot to `dest`.
    async fn fetch(&self, dest: &Path) -> io::Result<()>;
}

/// Loader that never provides a snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBootstrap;

#[async_trait]
impl BootstrapLoader for NoBootstrap {
    fn describe(&self) -> String {
        "nowhere".to_string()
    }

    async fn fetch(&self, _dest: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::NotFound, "bootstrap disabled"))
    }
}

/// Copies a headers file from a local path, e.g. one shipped alongside the
/// application or downloaded out of band.
#[derive(Debug, Clone)]
pub struct FileBootstrap {
    source: PathBuf,
}

impl FileBootstrap {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl BootstrapLoader for FileBootstrap {
    fn describe(&self) -> String {
        self.source.display().to_string()
    }

    async fn fetch(&self, dest: &Path) -> io::Result<()> {
        let copied = tokio::fs::copy(&self.source, dest).await?;
        tracing::debug!("Copied {} bytes of headers into {:?}", copied, dest);
        Ok(())
    }
}
