//! Core types for playback management

use cadence_core::{RepeatMode, TrackId, COMPLETED_FRACTION, SKIPPED_FRACTION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Canonical transport state
///
/// Owned exclusively by the state machine; everything else observes it
/// through snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    /// Nothing has been played yet in this session
    #[default]
    Idle,

    /// A track is being opened by the decode engine
    Buffering,

    /// Audio is being produced
    Playing,

    /// Paused mid-track
    Paused,

    /// Stopped; the queue is kept
    Stopped,

    /// Playback failed; only an explicit play/retry recovers
    Error(ErrorReason),
}

impl TransportState {
    /// Short lowercase name, used in logs and the notification
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Buffering => "buffering",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error(_) => "error",
        }
    }

    /// Whether audio output is (or is about to be) active
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Buffering | Self::Playing)
    }

    /// Whether this is the error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "error ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Why the session entered the error state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorReason {
    /// Another audio source holds focus
    FocusDenied,

    /// The track could not be decoded
    DecodeFailure {
        /// Track that failed
        track_id: TrackId,
        /// Engine-provided reason
        reason: String,
    },

    /// The engine reported an unrecoverable fault
    Engine(String),
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FocusDenied => f.write_str("audio focus denied"),
            Self::DecodeFailure { track_id, reason } => {
                write!(f, "cannot decode {track_id}: {reason}")
            }
            Self::Engine(reason) => write!(f, "engine fault: {reason}"),
        }
    }
}

/// Audio focus as last reported by the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFocusState {
    /// Focus never requested, or abandoned
    #[default]
    None,
    /// This session holds focus
    Gained,
    /// Focus taken for good; no auto-resume
    LostPermanent,
    /// Focus taken briefly; pause and resume on regain
    LostTransient,
    /// Focus shared; lower output gain
    LostTransientDuckable,
}

/// Why the transport stopped
///
/// The notification is removed only for `User` stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCause {
    /// Explicit stop command
    User,
    /// Natural end of the queue with repeat off
    QueueEnded,
    /// Sleep timer expiry
    SleepTimer,
    /// Permanent focus loss
    FocusLost,
}

/// Configuration for the playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume (0-100, default: 80)
    pub volume: u8,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Initial shuffle flag (default: false)
    pub shuffle: bool,

    /// Gain multiplier applied while ducked (default: 0.2)
    pub duck_level: f32,

    /// Sleep timer tick interval in milliseconds (default: 1000)
    pub sleep_tick_ms: u64,

    /// Length of the sleep timer fade-out window in milliseconds (default: 30000)
    pub fade_window_ms: u64,

    /// Continuous pause before the host service is demoted, in milliseconds (default: 30000)
    pub host_grace_ms: u64,

    /// `previous` restarts the current track past this position, in milliseconds (default: 3000)
    pub previous_restart_ms: u64,

    /// Resume on headphone connect when the pause was not the user's (default: false)
    pub resume_on_headphones: bool,

    /// Fraction played for a listen to count as completed (default: 0.8)
    pub completed_fraction: f64,

    /// Listens shorter than this fraction count as skipped (default: 0.1)
    pub skipped_fraction: f64,

    /// Position report interval requested from the engine, in milliseconds (default: 500)
    pub position_interval_ms: u64,
}

impl PlaybackConfig {
    /// Sleep timer tick interval
    pub fn sleep_tick(&self) -> Duration {
        Duration::from_millis(self.sleep_tick_ms.max(1))
    }

    /// Fade-out window
    pub fn fade_window(&self) -> Duration {
        Duration::from_millis(self.fade_window_ms)
    }

    /// Host demotion grace period
    pub fn host_grace(&self) -> Duration {
        Duration::from_millis(self.host_grace_ms)
    }

    /// Restart threshold for `previous`
    pub fn previous_restart(&self) -> Duration {
        Duration::from_millis(self.previous_restart_ms)
    }

    /// Position report interval
    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(1))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 80,
            repeat: RepeatMode::Off,
            shuffle: false,
            duck_level: 0.2,
            sleep_tick_ms: 1000,
            fade_window_ms: 30_000,
            host_grace_ms: 30_000,
            previous_restart_ms: 3000,
            resume_on_headphones: false,
            completed_fraction: COMPLETED_FRACTION,
            skipped_fraction: SKIPPED_FRACTION,
            position_interval_ms: 500,
        }
    }
}
