//! Sync engine that owns the worker and its background task.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::network::HeaderNetwork;
use crate::storage::HeaderStorage;
use crate::sync::events::{Announcement, AnnouncementSender, HeightListener, SyncPhase};
use crate::sync::policy::PeerPolicy;
use crate::sync::worker::SyncWorker;
use crate::validation::DifficultyOracle;

type WorkerExit<S, N, O, L> =
    (SyncWorker<S, N, O, L>, mpsc::UnboundedReceiver<Announcement>, SyncResult<()>);

/// Explicit lifecycle around a [`SyncWorker`].
///
/// While stopped, the engine holds the worker and the announcement queue.
/// `start()` moves both onto a tokio task; `stop()` cancels it and takes
/// them back, so the store can be inspected or the engine restarted.
/// Announcements queued while stopped are processed on the next start.
pub struct SyncEngine<S, N, O, L> {
    worker: Option<SyncWorker<S, N, O, L>>,
    announcements_rx: Option<mpsc::UnboundedReceiver<Announcement>>,
    announcements_tx: mpsc::UnboundedSender<Announcement>,
    phase: watch::Receiver<SyncPhase>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<WorkerExit<S, N, O, L>>>,
}

impl<S, N, O, L> SyncEngine<S, N, O, L>
where
    S: HeaderStorage + 'static,
    N: HeaderNetwork + 'static,
    O: DifficultyOracle + 'static,
    L: HeightListener + 'static,
{
    /// Create a stopped engine around its collaborators.
    pub fn new(config: SyncConfig, store: S, network: N, oracle: O, listener: L) -> SyncResult<Self> {
        config.validate().map_err(SyncError::Config)?;
        if store.chunk_size() != config.chunk_size {
            return Err(SyncError::Config(format!(
                "store chunk size {} does not match configured {}",
                store.chunk_size(),
                config.chunk_size
            )));
        }

        let worker = SyncWorker::new(config, store, network, oracle, listener);
        let phase = worker.subscribe_phase();
        let (announcements_tx, announcements_rx) = mpsc::unbounded_channel();

        Ok(Self {
            worker: Some(worker),
            announcements_rx: Some(announcements_rx),
            announcements_tx,
            phase,
            shutdown: CancellationToken::new(),
            task: None,
        })
    }

    /// Replace the peer policy. Only possible while stopped.
    pub fn with_policy(mut self, policy: Box<dyn PeerPolicy>) -> Self {
        if let Some(worker) = self.worker.as_mut() {
            worker.set_policy(policy);
        }
        self
    }

    /// Handle for peers to queue announcements.
    pub fn announcement_sender(&self) -> AnnouncementSender {
        AnnouncementSender::new(self.announcements_tx.clone())
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.clone()
    }

    /// True while the worker task is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// The store, while the engine is stopped.
    pub fn store(&self) -> Option<&S> {
        self.worker.as_ref().map(SyncWorker::store)
    }

    pub fn store_mut(&mut self) -> Option<&mut S> {
        self.worker.as_mut().map(SyncWorker::store_mut)
    }

    /// Start the worker on a background task.
    pub fn start(&mut self) -> SyncResult<()> {
        if self.task.is_some() {
            return Err(SyncError::InvalidState("Sync engine already running".to_string()));
        }

        let mut worker = self
            .worker
            .take()
            .ok_or_else(|| SyncError::InvalidState("Sync worker already taken".to_string()))?;
        let mut announcements = self
            .announcements_rx
            .take()
            .ok_or_else(|| SyncError::InvalidState("Announcement queue already taken".to_string()))?;

        // A cancelled token cannot be reset.
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }
        let shutdown = self.shutdown.clone();

        self.task = Some(tokio::spawn(async move {
            let result = worker.run(&mut announcements, &shutdown).await;
            (worker, announcements, result)
        }));

        tracing::info!("Sync engine started");
        Ok(())
    }

    /// Signal the worker to stop and wait for it.
    ///
    /// Returns the error that stopped the worker early, if any. Calling this
    /// on a stopped engine is a no-op.
    pub async fn stop(&mut self) -> SyncResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        self.shutdown.cancel();
        let (worker, announcements, result) = task
            .await
            .map_err(|e| SyncError::InvalidState(format!("Sync worker task failed: {}", e)))?;

        self.worker = Some(worker);
        self.announcements_rx = Some(announcements);
        tracing::info!("Sync engine stopped");
        result
    }
}

impl<S, N, O, L> Drop for SyncEngine<S, N, O, L> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
