//! Header synchronization: announcement queue, worker and engine lifecycle.

mod engine;
mod events;
mod policy;
mod worker;

pub use engine::SyncEngine;
pub use events::{
    Announcement, AnnouncementSender, HeightEvent, HeightListener, NoopListener, SyncPhase,
};
pub use policy::{misbehavior_scores, MisbehaviorPolicy, NoPenalty, PeerPolicy};
pub use worker::SyncWorker;
