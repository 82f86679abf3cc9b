//! Library tracks

use cadence_core::{Track, TrackId};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

use crate::{from_millis, to_millis, Result, StorageError};

#[derive(sqlx::FromRow)]
struct TrackRow {
    id: String,
    title: String,
    artist: Option<String>,
    album: Option<String>,
    duration_ms: i64,
    path: String,
    track_number: Option<i64>,
}

impl From<TrackRow> for Track {
    fn from(row: TrackRow) -> Self {
        Track {
            id: TrackId::new(row.id),
            title: row.title,
            artist: row.artist,
            album: row.album,
            duration: from_millis(row.duration_ms),
            path: PathBuf::from(row.path),
            track_number: row.track_number.and_then(|n| u32::try_from(n).ok()),
        }
    }
}

const SELECT_TRACK: &str =
    "SELECT id, title, artist, album, duration_ms, path, track_number FROM tracks";

/// Get a track by id
pub async fn get_by_id(pool: &SqlitePool, id: &TrackId) -> Result<Option<Track>> {
    let row = sqlx::query_as::<_, TrackRow>(&format!("{SELECT_TRACK} WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Track::from))
}

/// Get a track by its file path
pub async fn get_by_path(pool: &SqlitePool, path: &Path) -> Result<Option<Track>> {
    let row = sqlx::query_as::<_, TrackRow>(&format!("{SELECT_TRACK} WHERE path = ?"))
        .bind(path.to_string_lossy().as_ref())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Track::from))
}

/// Get all tracks ordered by title
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<Track>> {
    let rows = sqlx::query_as::<_, TrackRow>(&format!("{SELECT_TRACK} ORDER BY title, id"))
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Track::from).collect())
}

/// Insert a track, or update its metadata if the id already exists
///
/// Play counts survive the update.
pub async fn upsert(pool: &SqlitePool, track: &Track) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO tracks
         (id, title, artist, album, duration_ms, path, track_number, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id)
         DO UPDATE SET
            title = excluded.title,
            artist = excluded.artist,
            album = excluded.album,
            duration_ms = excluded.duration_ms,
            path = excluded.path,
            track_number = excluded.track_number,
            updated_at = excluded.updated_at",
    )
    .bind(track.id.as_str())
    .bind(&track.title)
    .bind(track.artist.as_deref())
    .bind(track.album.as_deref())
    .bind(to_millis(track.duration))
    .bind(track.path.to_string_lossy().as_ref())
    .bind(track.track_number.map(i64::from))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove a track from the library
pub async fn delete(pool: &SqlitePool, id: &TrackId) -> Result<()> {
    let result = sqlx::query("DELETE FROM tracks WHERE id = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("track", id.as_str()));
    }
    Ok(())
}

/// Bump the play count and last-played time
///
/// Tracks that aren't in the library are ignored.
pub async fn increment_play_count(pool: &SqlitePool, id: &TrackId) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE tracks SET play_count = play_count + 1, last_played_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(id.as_str())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Current play count (zero for unknown tracks)
pub async fn play_count(pool: &SqlitePool, id: &TrackId) -> Result<u32> {
    let count: Option<i64> = sqlx::query_scalar("SELECT play_count FROM tracks WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(count.and_then(|c| u32::try_from(c).ok()).unwrap_or(0))
}
