//! Cadence Storage
//!
//! `SQLite` storage for the Cadence player.
//!
//! This crate persists what the playback core reads and writes through its
//! collaborator traits:
//! - **Tracks**: lookup by id or file path, play counts
//! - **Play history**: one row per listen, classified by the playback core
//! - **Session state**: the single resume record, as a key-value entry
//!
//! Each concern is a vertical slice owning its own queries.
//! [`SqliteLibrary`] ties them together behind `Library` and `ResumeStore`.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_core::{Library, TrackId};
//! use cadence_storage::{create_pool, run_migrations, SqliteLibrary};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://cadence.db").await?;
//! run_migrations(&pool).await?;
//!
//! let library = SqliteLibrary::new(pool);
//! let track = library.track_by_id(&TrackId::new("intro")).await?;
//! # Ok(())
//! # }
//! ```

mod context;
mod error;

// Vertical slices
pub mod play_history;
pub mod resume;
pub mod tracks;

pub use context::SqliteLibrary;
pub use error::{Result, StorageError};

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// Call once at startup, before any query.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `sqlite://cadence.db`)
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    debug!(url = database_url, "Creating SQLite pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    debug!("SQLite pool ready");
    Ok(pool)
}

/// Convert a duration to whole milliseconds for an INTEGER column
pub(crate) fn to_millis(duration: std::time::Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Convert an INTEGER milliseconds column back to a duration
pub(crate) fn from_millis(ms: i64) -> std::time::Duration {
    std::time::Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
