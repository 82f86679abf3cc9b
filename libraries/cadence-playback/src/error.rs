//! Error types for playback management

use cadence_core::TrackId;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Audio focus could not be acquired
    #[error("Audio focus denied")]
    FocusDenied,

    /// The decode engine could not open or decode a track
    #[error("Decode failure for {track_id}: {reason}")]
    DecodeFailure {
        /// Track that failed
        track_id: TrackId,
        /// Engine-provided reason
        reason: String,
    },

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Resume record could not be written or read
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The session task has shut down
    #[error("Playback session closed")]
    SessionClosed,
}

impl From<cadence_core::CoreError> for PlaybackError {
    fn from(err: cadence_core::CoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
