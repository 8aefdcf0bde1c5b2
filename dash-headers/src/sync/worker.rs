//! The single writer: consumes announcements and decides how to catch up.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{NetworkError, SyncError, SyncResult, ValidationError};
use crate::header::BlockHeader;
use crate::network::{bounded_request, HeaderNetwork};
use crate::storage::HeaderStorage;
use crate::sync::events::{Announcement, HeightListener, SyncPhase};
use crate::sync::policy::{NoPenalty, PeerPolicy};
use crate::types::{Chain, PeerId};
use crate::validation::{preceding_window, ChainVerifier, ChunkVerifier, DifficultyOracle};

/// Owns the store and every verification decision.
///
/// Only one `SyncWorker` may exist per store. [`crate::SyncEngine`] runs it on
/// a tokio task; tests drive [`SyncWorker::handle`] directly.
pub struct SyncWorker<S, N, O, L> {
    config: SyncConfig,
    store: S,
    network: N,
    verifier: ChainVerifier<O>,
    chunks: ChunkVerifier,
    listener: L,
    policy: Box<dyn PeerPolicy>,
    phase: watch::Sender<SyncPhase>,
}

impl<S, N, O, L> SyncWorker<S, N, O, L>
where
    S: HeaderStorage,
    N: HeaderNetwork,
    O: DifficultyOracle,
    L: HeightListener,
{
    pub fn new(config: SyncConfig, store: S, network: N, oracle: O, listener: L) -> Self {
        let verifier = ChainVerifier::new(oracle, config.pow_checkpoint_height);
        let chunks = ChunkVerifier::new(config.chunk_size, config.cache_kgw_size);
        let (phase, _) = watch::channel(SyncPhase::Idle);

        Self {
            config,
            store,
            network,
            verifier,
            chunks,
            listener,
            policy: Box::new(NoPenalty),
            phase,
        }
    }

    pub fn set_policy(&mut self, policy: Box<dyn PeerPolicy>) {
        self.policy = policy;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    /// Processes announcements until shutdown, the queue closes, or a storage
    /// error occurs. Any other failure only drops the current announcement.
    pub async fn run(
        &mut self,
        announcements: &mut mpsc::UnboundedReceiver<Announcement>,
        shutdown: &CancellationToken,
    ) -> SyncResult<()> {
        tracing::info!(
            "Header sync worker started at local height {}",
            self.store.local_height_i64()
        );

        loop {
            self.set_phase(SyncPhase::AwaitingAnnouncement);

            let announcement = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                next = announcements.recv() => match next {
                    Some(announcement) => announcement,
                    None => {
                        tracing::debug!("Announcement queue closed");
                        break;
                    }
                },
            };

            let peer = announcement.peer;
            match self.handle(announcement, shutdown).await {
                Ok(_) => {}
                Err(SyncError::Network(NetworkError::Cancelled)) => break,
                Err(e) if e.is_fatal() => {
                    tracing::error!("Header sync stopped: {}", e);
                    self.set_phase(SyncPhase::Failed);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Dropping announcement from {} ({}): {}", peer, e.category(), e);
                    self.policy.on_rejected(peer, &e);
                }
            }
        }

        tracing::info!("Header sync worker stopped at local height {}", self.store.local_height_i64());
        self.set_phase(SyncPhase::Idle);
        Ok(())
    }

    /// Brings the store up to `announcement` if possible.
    ///
    /// Returns the new local height, or `None` when the announcement was
    /// stale or the peer is not allowed.
    pub async fn handle(
        &mut self,
        announcement: Announcement,
        shutdown: &CancellationToken,
    ) -> SyncResult<Option<u32>> {
        let Announcement {
            peer,
            height,
            header,
        } = announcement;

        if !self.policy.allows(peer) {
            tracing::debug!("Ignoring announcement from banned {}", peer);
            return Ok(None);
        }

        let gap = i64::from(height) - self.store.local_height_i64();
        if gap <= 0 {
            tracing::trace!("Stale announcement of height {} from {}", height, peer);
            return Ok(None);
        }

        let before = self.store.local_height();
        let result = self.catch_up(peer, height, header, gap, shutdown).await;

        // Chunks accepted before a failure stay stored and are reported too.
        let after = self.store.local_height();
        if let Some(tip) = after.filter(|_| after > before) {
            tracing::info!("New local height {} from {}", tip, peer);
            self.listener.on_new_height(tip, peer);
        }
        result?;

        let Some(tip) = after else {
            return Ok(None);
        };
        self.policy.on_accepted(peer, tip);
        Ok(Some(tip))
    }

    async fn catch_up(
        &mut self,
        peer: PeerId,
        height: u32,
        header: BlockHeader,
        gap: i64,
        shutdown: &CancellationToken,
    ) -> SyncResult<()> {
        if gap > i64::from(self.config.bulk_threshold) {
            self.bulk_chunk_sync(peer, height, shutdown).await?;
        }

        if self.store.local_height().is_none_or(|tip| tip < height) {
            self.walkback_resolve(peer, height, header, shutdown).await?;
        }
        Ok(())
    }

    /// Downloads chunks from the one containing `local + 1` up to the one
    /// containing `announced + 1`, backing off one chunk after a failure.
    async fn bulk_chunk_sync(
        &mut self,
        peer: PeerId,
        announced: u32,
        shutdown: &CancellationToken,
    ) -> SyncResult<()> {
        let chunk_size = self.chunks.chunk_size();
        let chunk_of = |height: u32| {
            height
                .checked_add(1)
                .map(|next| next / chunk_size)
                .filter(|index| index.checked_mul(chunk_size).is_some())
        };
        let min_index = self.store.local_height().map_or(Some(0), |tip| chunk_of(tip));
        let (Some(min_index), Some(max_index)) = (min_index, chunk_of(announced)) else {
            return Err(SyncError::HeightOutOfRange {
                height: announced,
            });
        };

        self.set_phase(SyncPhase::BulkChunkSync {
            from_index: min_index,
            to_index: max_index,
        });
        tracing::info!("Bulk syncing chunks {}..={} from {}", min_index, max_index, peer);

        let mut index = min_index;
        let mut failures = 0;
        while index <= max_index {
            if shutdown.is_cancelled() {
                return Err(NetworkError::Cancelled.into());
            }

            let raw = bounded_request(
                self.network.request_chunk(peer, index),
                self.config.request_timeout,
                shutdown,
            )
            .await?;

            if raw.is_empty() {
                tracing::debug!("{} has no chunk {}, ending bulk sync", peer, index);
                break;
            }

            match self.chunks.accept(&self.verifier, &mut self.store, index, &raw) {
                Ok(_) => match index.checked_add(1) {
                    Some(next) => index = next,
                    None => break,
                },
                Err(e @ SyncError::ChunkVerificationFailed {
                    ..
                }) => {
                    failures += 1;
                    if failures > self.config.max_chunk_retries || index == 0 {
                        return Err(e);
                    }
                    tracing::warn!("{}; backing off to chunk {}", e, index - 1);
                    index -= 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Requests ancestors of `header` until they connect to the store, then
    /// verifies the whole run and writes it in ascending order.
    async fn walkback_resolve(
        &mut self,
        peer: PeerId,
        height: u32,
        header: BlockHeader,
        shutdown: &CancellationToken,
    ) -> SyncResult<u32> {
        self.set_phase(SyncPhase::WalkbackResolve {
            announced_height: height,
        });

        let mut chain = Chain::new(height, vec![header]);
        let mut depth = 0;

        loop {
            if shutdown.is_cancelled() {
                return Err(NetworkError::Cancelled.into());
            }

            let start = chain.start_height();
            let prev_hash = chain.first().map(|first| first.prev_blockhash).unwrap_or_default();

            if start == 0 {
                // Genesis linkage is checked by the verifier.
                break;
            }
            if let Some(local) = self.store.read(start - 1)? {
                if local.block_hash() == prev_hash {
                    break;
                }
            }

            if depth >= self.config.max_walkback_depth {
                return Err(SyncError::ReorgTooDeep {
                    depth,
                    max: self.config.max_walkback_depth,
                });
            }

            let ancestor = bounded_request(
                self.network.request_header(peer, start - 1),
                self.config.request_timeout,
                shutdown,
            )
            .await?;
            depth += 1;

            if ancestor.block_hash() != prev_hash {
                return Err(ValidationError::LinkageMismatch {
                    height: start,
                }
                .into());
            }
            chain.push_front(ancestor);
        }

        if depth > 0 {
            tracing::debug!(
                "Walked back {} headers; {} reconnects at height {}",
                depth,
                peer,
                chain.start_height()
            );
        }

        let preceding = preceding_window(&mut self.store, chain.start_height(), self.config.cache_kgw_size)?;
        self.verifier.verify(&preceding, &chain)?;

        for (h, header) in chain.iter() {
            self.store.write_one(header, h)?;
        }

        Ok(chain.tip_height().unwrap_or(height))
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
