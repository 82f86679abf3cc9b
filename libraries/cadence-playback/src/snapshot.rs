//! Playback snapshot
//!
//! The single canonical value broadcast to every projection. Snapshots are
//! immutable and cheap to clone: the track and the queue summary are shared
//! behind `Arc`s, so a position tick only copies a handful of scalars.

use cadence_core::{RepeatMode, ResumeRecord, Track, TrackId};
use std::sync::Arc;
use std::time::Duration;

use crate::sleep_timer::SleepTimerState;
use crate::types::{AudioFocusState, StopCause, TransportState};

/// Immutable view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    /// Bumped on every change other than position/countdown progress
    pub revision: u64,

    /// Current track
    pub track: Option<Arc<Track>>,

    /// Position within the current track
    pub position: Duration,

    /// Duration of the current track
    pub duration: Duration,

    /// Transport state
    pub transport: TransportState,

    /// Queue track ids in stored order
    pub queue: Arc<[TrackId]>,

    /// Current queue index
    pub queue_index: Option<usize>,

    /// Repeat mode
    pub repeat: RepeatMode,

    /// Shuffle flag
    pub shuffle: bool,

    /// Volume level (0-100)
    pub volume: u8,

    /// Playback speed multiplier
    pub speed: f32,

    /// Audio focus
    pub focus: AudioFocusState,

    /// Sleep timer
    pub sleep_timer: SleepTimerState,

    /// Why the transport last stopped; cleared when playback starts again
    pub stop_cause: Option<StopCause>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            revision: 0,
            track: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            transport: TransportState::Idle,
            queue: Arc::from(Vec::new()),
            queue_index: None,
            repeat: RepeatMode::Off,
            shuffle: false,
            volume: 80,
            speed: 1.0,
            focus: AudioFocusState::None,
            sleep_timer: SleepTimerState::default(),
            stop_cause: None,
        }
    }
}

impl PlaybackSnapshot {
    /// Current track id
    pub fn track_id(&self) -> Option<&TrackId> {
        self.track.as_ref().map(|t| &t.id)
    }

    /// Whether everything except progress counters is equal
    ///
    /// Position and sleep timer remaining time move on every tick and don't
    /// count as a change of state.
    pub fn same_state(&self, other: &Self) -> bool {
        self.track_id() == other.track_id()
            && self.duration == other.duration
            && self.transport == other.transport
            && (Arc::ptr_eq(&self.queue, &other.queue) || self.queue == other.queue)
            && self.queue_index == other.queue_index
            && self.repeat == other.repeat
            && self.shuffle == other.shuffle
            && self.volume == other.volume
            && (self.speed - other.speed).abs() < f32::EPSILON
            && self.focus == other.focus
            && self.sleep_timer.active == other.sleep_timer.active
            && self.sleep_timer.total == other.sleep_timer.total
            && self.sleep_timer.fade_out == other.sleep_timer.fade_out
            && self.stop_cause == other.stop_cause
    }

    /// Durable subset for the resume store
    pub fn to_resume_record(&self) -> ResumeRecord {
        ResumeRecord {
            track_id: self.track_id().cloned(),
            position_ms: u64::try_from(self.position.as_millis()).unwrap_or(u64::MAX),
            queue: self.queue.to_vec(),
            queue_index: self.queue_index,
            repeat_mode: self.repeat,
            shuffle: self.shuffle,
        }
    }
}
