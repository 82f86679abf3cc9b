/// Collaborator traits for Cadence
///
/// The playback core never talks to a database directly. It consumes track
/// lookups and issues write-through history calls via `Library`, and it
/// reads/writes the single resume record via `ResumeStore`.
use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{PlayRecord, ResumeRecord, Track, TrackId};

/// Track library collaborator
#[async_trait]
pub trait Library: Send + Sync {
    /// Look up a track by identifier
    async fn track_by_id(&self, id: &TrackId) -> Result<Option<Track>>;

    /// Look up a track by file path
    async fn track_by_path(&self, path: &Path) -> Result<Option<Track>>;

    /// Record a listen in play history
    async fn record_play(&self, record: &PlayRecord) -> Result<()>;

    /// Increment the play count of a track
    async fn increment_play_count(&self, id: &TrackId) -> Result<()>;
}

/// Durable storage for the resume record
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Load the stored record, if any
    async fn load(&self) -> Result<Option<ResumeRecord>>;

    /// Replace the stored record
    async fn save(&self, record: &ResumeRecord) -> Result<()>;
}
