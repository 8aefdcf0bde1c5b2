//! Messages flowing into and out of the sync worker.

use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::header::BlockHeader;
use crate::types::PeerId;

/// A peer telling us about the header it considers its tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    pub peer: PeerId,
    pub height: u32,
    pub header: BlockHeader,
}

/// Producer handle for the worker queue. Cheap to clone; hand one to every
/// peer connection.
#[derive(Debug, Clone)]
pub struct AnnouncementSender {
    tx: mpsc::UnboundedSender<Announcement>,
}

impl AnnouncementSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Announcement>) -> Self {
        Self {
            tx,
        }
    }

    /// Queues an announcement. Fails only once the engine has been dropped.
    pub fn announce(&self, peer: PeerId, height: u32, header: BlockHeader) -> SyncResult<()> {
        self.tx
            .send(Announcement {
                peer,
                height,
                header,
            })
            .map_err(|_| SyncError::InvalidState("Sync engine is gone".to_string()))
    }
}

/// Emitted after the store reached a new verified height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightEvent {
    pub height: u32,
    /// Peer whose headers got us there.
    pub peer: PeerId,
}

/// Receives new-height notifications. Fire and forget.
pub trait HeightListener: Send + Sync {
    fn on_new_height(&self, height: u32, peer: PeerId);
}

impl HeightListener for mpsc::UnboundedSender<HeightEvent> {
    fn on_new_height(&self, height: u32, peer: PeerId) {
        if self
            .send(HeightEvent {
                height,
                peer,
            })
            .is_err()
        {
            tracing::trace!("Height listener dropped, discarding height {}", height);
        }
    }
}

impl<F> HeightListener for F
where
    F: Fn(u32, PeerId) + Send + Sync,
{
    fn on_new_height(&self, height: u32, peer: PeerId) {
        self(height, peer)
    }
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl HeightListener for NoopListener {
    fn on_new_height(&self, _height: u32, _peer: PeerId) {}
}

/// Coarse state of the sync worker, published through a `watch` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not started, or stopped cleanly.
    Idle,

    /// Waiting on the announcement queue.
    AwaitingAnnouncement,

    /// Downloading whole chunks.
    BulkChunkSync {
        from_index: u32,
        to_index: u32,
    },

    /// Requesting ancestors of an announced header until it reconnects.
    WalkbackResolve {
        announced_height: u32,
    },

    /// Stopped after a storage failure.
    Failed,
}
