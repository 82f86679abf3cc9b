//! SQLite-backed collaborator for the playback session

use async_trait::async_trait;
use cadence_core::{Library, PlayRecord, ResumeRecord, ResumeStore, Result, Track, TrackId};
use sqlx::SqlitePool;
use std::path::Path;

use crate::{play_history, resume, tracks};

/// Library, play history and resume record over one pool
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct SqliteLibrary {
    pool: SqlitePool,
}

impl SqliteLibrary {
    /// Wrap a migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Add or update a library track
    pub async fn add_track(&self, track: &Track) -> Result<()> {
        tracks::upsert(&self.pool, track).await?;
        Ok(())
    }

    /// Every library track
    pub async fn all_tracks(&self) -> Result<Vec<Track>> {
        Ok(tracks::get_all(&self.pool).await?)
    }

    /// Play count of a track
    pub async fn play_count(&self, id: &TrackId) -> Result<u32> {
        Ok(tracks::play_count(&self.pool, id).await?)
    }

    /// Most recent listens, newest first
    pub async fn recent_plays(&self, limit: u32) -> Result<Vec<PlayRecord>> {
        Ok(play_history::recent(&self.pool, limit).await?)
    }
}

#[async_trait]
impl Library for SqliteLibrary {
    async fn track_by_id(&self, id: &TrackId) -> Result<Option<Track>> {
        Ok(tracks::get_by_id(&self.pool, id).await?)
    }

    async fn track_by_path(&self, path: &Path) -> Result<Option<Track>> {
        Ok(tracks::get_by_path(&self.pool, path).await?)
    }

    async fn record_play(&self, record: &PlayRecord) -> Result<()> {
        play_history::record(&self.pool, record).await?;
        Ok(())
    }

    async fn increment_play_count(&self, id: &TrackId) -> Result<()> {
        tracks::increment_play_count(&self.pool, id).await?;
        Ok(())
    }
}

#[async_trait]
impl ResumeStore for SqliteLibrary {
    async fn load(&self) -> Result<Option<ResumeRecord>> {
        Ok(resume::load(&self.pool).await?)
    }

    async fn save(&self, record: &ResumeRecord) -> Result<()> {
        resume::save(&self.pool, record).await?;
        Ok(())
    }
}
