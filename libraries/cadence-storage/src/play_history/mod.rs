//! Play history
//!
//! Outcomes arrive already classified by the playback core and are stored
//! as given.

use cadence_core::{PlayOutcome, PlayRecord, TrackId};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{from_millis, to_millis, Result, StorageError};

#[derive(sqlx::FromRow)]
struct HistoryRow {
    track_id: String,
    outcome: String,
    played_ms: i64,
    duration_ms: i64,
    played_at: i64,
}

impl TryFrom<HistoryRow> for PlayRecord {
    type Error = StorageError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        let outcome = PlayOutcome::from_str(&row.outcome)
            .ok_or_else(|| StorageError::corrupt("play outcome", row.outcome.clone()))?;
        let played_at = DateTime::<Utc>::from_timestamp_millis(row.played_at)
            .ok_or_else(|| StorageError::corrupt("play timestamp", row.played_at.to_string()))?;
        Ok(PlayRecord {
            track_id: TrackId::new(row.track_id),
            outcome,
            played: from_millis(row.played_ms),
            duration: from_millis(row.duration_ms),
            played_at,
        })
    }
}

/// Append a listen to the history
pub async fn record(pool: &SqlitePool, record: &PlayRecord) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO play_history (track_id, outcome, played_ms, duration_ms, played_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(record.track_id.as_str())
    .bind(record.outcome.as_str())
    .bind(to_millis(record.played))
    .bind(to_millis(record.duration))
    .bind(record.played_at.timestamp_millis())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Most recent listens, newest first
pub async fn recent(pool: &SqlitePool, limit: u32) -> Result<Vec<PlayRecord>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT track_id, outcome, played_ms, duration_ms, played_at
         FROM play_history
         ORDER BY played_at DESC, id DESC
         LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(PlayRecord::try_from).collect()
}

/// Every listen of one track, oldest first
pub async fn for_track(pool: &SqlitePool, track_id: &TrackId) -> Result<Vec<PlayRecord>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT track_id, outcome, played_ms, duration_ms, played_at
         FROM play_history
         WHERE track_id = ?
         ORDER BY played_at, id",
    )
    .bind(track_id.as_str())
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(PlayRecord::try_from).collect()
}
