//! Resume record
//!
//! A single JSON document in the `session_state` key-value table. It is
//! replaced wholesale on every save.

use cadence_core::ResumeRecord;
use sqlx::SqlitePool;

use crate::Result;

const RESUME_KEY: &str = "resume";

/// Read the stored record, if any
pub async fn load(pool: &SqlitePool) -> Result<Option<ResumeRecord>> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM session_state WHERE key = ?")
            .bind(RESUME_KEY)
            .fetch_optional(pool)
            .await?;

    match value {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Replace the stored record
pub async fn save(pool: &SqlitePool, record: &ResumeRecord) -> Result<()> {
    let json = serde_json::to_string(record)?;
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO session_state (key, value, updated_at)
         VALUES (?, ?, ?)
         ON CONFLICT(key)
         DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(RESUME_KEY)
    .bind(json)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Forget the stored record
pub async fn clear(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM session_state WHERE key = ?")
        .bind(RESUME_KEY)
        .execute(pool)
        .await?;
    Ok(())
}
