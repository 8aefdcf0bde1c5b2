//! What happens to a peer after its headers were accepted or rejected.
//!
//! The sync worker never decides on its own to ignore a peer. It reports
//! outcomes to a [`PeerPolicy`] and asks it whether a peer's announcements
//! should still be processed. [`NoPenalty`] is the default.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{NetworkError, SyncError};
use crate::types::PeerId;

/// Misbehavior scores for different failures
pub mod misbehavior_scores {
    /// Chain failed linkage, bits or proof of work checks
    pub const INVALID_HEADER: i32 = 50;

    /// A chunk failed verification
    pub const INVALID_CHUNK: i32 = 50;

    /// Forced a walk-back deeper than allowed
    pub const REORG_TOO_DEEP: i32 = 25;

    /// Timeout or slow response
    pub const TIMEOUT: i32 = 5;

    /// Protocol violation or disconnect
    pub const NETWORK: i32 = 10;
}

/// Score reward for a peer whose headers were accepted
pub const VALID_HEADERS: i32 = -5;

/// Peer penalization hook.
pub trait PeerPolicy: Send + Sync {
    /// Whether announcements from `peer` should be processed.
    fn allows(&self, _peer: PeerId) -> bool {
        true
    }

    /// Called after an announcement from `peer` was dropped because of `error`.
    fn on_rejected(&self, peer: PeerId, error: &SyncError);

    /// Called after headers from `peer` brought the store to `height`.
    fn on_accepted(&self, _peer: PeerId, _height: u32) {}
}

/// Never penalizes anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPenalty;

impl PeerPolicy for NoPenalty {
    fn on_rejected(&self, peer: PeerId, error: &SyncError) {
        tracing::debug!("Not penalizing {} for: {}", peer, error);
    }
}

/// Maximum misbehavior score before a peer is banned
const MAX_MISBEHAVIOR_SCORE: i32 = 100;

/// Minimum score (most positive reputation)
const MIN_MISBEHAVIOR_SCORE: i32 = -50;

#[derive(Debug, Default, Clone, Copy)]
struct PeerScore {
    score: i32,
    banned_until: Option<Instant>,
}

/// Scores failures per peer and ignores a peer for `ban_duration` once its
/// score reaches the ban threshold.
#[derive(Debug)]
pub struct MisbehaviorPolicy {
    ban_duration: Duration,
    scores: Mutex<HashMap<PeerId, PeerScore>>,
}

impl Default for MisbehaviorPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

impl MisbehaviorPolicy {
    pub fn new(ban_duration: Duration) -> Self {
        Self {
            ban_duration,
            scores: Mutex::new(HashMap::new()),
        }
    }

    /// Current score of `peer`; 0 for peers never seen.
    pub fn score(&self, peer: PeerId) -> i32 {
        self.lock().get(&peer).map_or(0, |entry| entry.score)
    }

    pub fn is_banned(&self, peer: PeerId) -> bool {
        self.lock()
            .get(&peer)
            .and_then(|entry| entry.banned_until)
            .is_some_and(|until| Instant::now() < until)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PeerId, PeerScore>> {
        // A poisoned map still holds valid scores.
        self.scores.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn penalty(error: &SyncError) -> i32 {
        match error {
            SyncError::ChunkVerificationFailed {
                ..
            } => misbehavior_scores::INVALID_CHUNK,
            SyncError::Validation(_)
            | SyncError::HeightOutOfRange {
                ..
            } => misbehavior_scores::INVALID_HEADER,
            SyncError::ReorgTooDeep {
                ..
            } => misbehavior_scores::REORG_TOO_DEEP,
            SyncError::Network(NetworkError::Timeout) => misbehavior_scores::TIMEOUT,
            SyncError::Network(NetworkError::Cancelled) => 0,
            SyncError::Network(_) => misbehavior_scores::NETWORK,
            SyncError::Storage(_) | SyncError::InvalidState(_) | SyncError::Config(_) => 0,
        }
    }

    fn adjust(&self, peer: PeerId, change: i32, reason: &dyn std::fmt::Display) {
        let mut scores = self.lock();
        let entry = scores.entry(peer).or_default();
        entry.score = (entry.score + change).clamp(MIN_MISBEHAVIOR_SCORE, MAX_MISBEHAVIOR_SCORE);

        if entry.score >= MAX_MISBEHAVIOR_SCORE && entry.banned_until.is_none() {
            tracing::warn!("Banning {} for {:?}: {}", peer, self.ban_duration, reason);
            entry.banned_until = Some(Instant::now() + self.ban_duration);
        }
    }
}

impl PeerPolicy for MisbehaviorPolicy {
    fn allows(&self, peer: PeerId) -> bool {
        !self.is_banned(peer)
    }

    fn on_rejected(&self, peer: PeerId, error: &SyncError) {
        let penalty = Self::penalty(error);
        if penalty != 0 {
            self.adjust(peer, penalty, error);
        }
    }

    fn on_accepted(&self, peer: PeerId, height: u32) {
        self.adjust(peer, VALID_HEADERS, &format_args!("accepted up to {}", height));
    }
}
