/// Durable resume record
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{RepeatMode, TrackId};

/// The durable subset of a playback snapshot
///
/// Written on every meaningful transition and read once at process start to
/// pre-populate the queue. Restoring never starts playback by itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResumeRecord {
    /// Track that was current when the record was written
    pub track_id: Option<TrackId>,

    /// Position within that track, in milliseconds
    pub position_ms: u64,

    /// Queue contents in stored (unshuffled) order
    pub queue: Vec<TrackId>,

    /// Current index into `queue`
    pub queue_index: Option<usize>,

    /// Repeat mode
    pub repeat_mode: RepeatMode,

    /// Whether shuffle was enabled
    pub shuffle: bool,
}

impl ResumeRecord {
    /// Position as a `Duration`
    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms)
    }

    /// Whether there is anything to restore
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
