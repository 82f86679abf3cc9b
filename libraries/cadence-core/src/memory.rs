//! In-memory collaborators
//!
//! Used by tests and by the daemon's `--ephemeral` mode, where nothing
//! should touch the disk.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::traits::{Library, ResumeStore};
use crate::types::{PlayRecord, ResumeRecord, Track, TrackId};

/// Library backed by a `HashMap`
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    tracks: Mutex<HashMap<TrackId, Track>>,
    history: Mutex<Vec<PlayRecord>>,
    play_counts: Mutex<HashMap<TrackId, u32>>,
}

impl InMemoryLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library pre-populated with tracks
    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let map = tracks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tracks: Mutex::new(map),
            ..Self::default()
        }
    }

    /// Add or replace a track
    pub async fn insert(&self, track: Track) {
        self.tracks.lock().await.insert(track.id.clone(), track);
    }

    /// All recorded listens, oldest first
    pub async fn history(&self) -> Vec<PlayRecord> {
        self.history.lock().await.clone()
    }

    /// Play count for a track
    pub async fn play_count(&self, id: &TrackId) -> u32 {
        self.play_counts.lock().await.get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Library for InMemoryLibrary {
    async fn track_by_id(&self, id: &TrackId) -> Result<Option<Track>> {
        Ok(self.tracks.lock().await.get(id).cloned())
    }

    async fn track_by_path(&self, path: &Path) -> Result<Option<Track>> {
        Ok(self
            .tracks
            .lock()
            .await
            .values()
            .find(|t| t.path == path)
            .cloned())
    }

    async fn record_play(&self, record: &PlayRecord) -> Result<()> {
        self.history.lock().await.push(record.clone());
        Ok(())
    }

    async fn increment_play_count(&self, id: &TrackId) -> Result<()> {
        *self.play_counts.lock().await.entry(id.clone()).or_insert(0) += 1;
        Ok(())
    }
}

/// Resume store holding the record in memory
#[derive(Debug, Default)]
pub struct InMemoryResumeStore {
    record: Mutex<Option<ResumeRecord>>,
    writes: Mutex<usize>,
}

impl InMemoryResumeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a record
    pub fn with_record(record: ResumeRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            writes: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far
    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn load(&self) -> Result<Option<ResumeRecord>> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &ResumeRecord) -> Result<()> {
        *self.record.lock().await = Some(record.clone());
        *self.writes.lock().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayOutcome;
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn library_finds_tracks_by_id_and_path() {
        let library = InMemoryLibrary::with_tracks([Track::new(
            "a",
            "Song A",
            PathBuf::from("/music/a.mp3"),
        )]);

        let by_id = library.track_by_id(&TrackId::new("a")).await.unwrap();
        assert_eq!(by_id.map(|t| t.title), Some("Song A".to_string()));

        let by_path = library
            .track_by_path(Path::new("/music/a.mp3"))
            .await
            .unwrap();
        assert!(by_path.is_some());

        assert!(library.track_by_id(&TrackId::new("zz")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn library_records_history_and_counts() {
        let library = InMemoryLibrary::new();
        let id = TrackId::new("a");
        let record = PlayRecord::new(
            id.clone(),
            PlayOutcome::Completed,
            Duration::from_secs(170),
            Duration::from_secs(180),
        );

        library.record_play(&record).await.unwrap();
        library.increment_play_count(&id).await.unwrap();
        library.increment_play_count(&id).await.unwrap();

        assert_eq!(library.history().await.len(), 1);
        assert_eq!(library.play_count(&id).await, 2);
    }

    #[tokio::test]
    async fn resume_store_replaces_record() {
        let store = InMemoryResumeStore::new();
        assert!(store.load().await.unwrap().is_none());

        let record = ResumeRecord {
            position_ms: 1000,
            ..ResumeRecord::default()
        };
        store.save(&record).await.unwrap();
        store.save(&record).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(record));
        assert_eq!(store.write_count().await, 2);
    }
}
