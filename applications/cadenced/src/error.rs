/// Daemon error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] cadence_storage::StorageError),

    #[error("Playback error: {0}")]
    Playback(#[from] cadence_playback::PlaybackError),

    #[error("Library error: {0}")]
    Library(#[from] cadence_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
