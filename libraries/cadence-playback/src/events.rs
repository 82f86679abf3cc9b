//! Session events
//!
//! Everything that can change playback is a [`SessionEvent`] funneled through
//! the session inbox: UI commands, focus changes, sleep timer ticks, decode
//! engine callbacks and host signals. The state machine reports back with
//! [`PlaybackEvent`]s.

use cadence_core::{PlayRecord, RepeatMode, Track, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::engine::EngineEvent;
use crate::sleep_timer::SleepTimerEvent;
use crate::types::{AudioFocusState, TransportState};

/// Inbound event for the state machine
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// User or media-session command
    Command(Command),
    /// Focus change reported by the arbiter
    Focus(AudioFocusState),
    /// Sleep timer tick or expiry
    SleepTimer(SleepTimerEvent),
    /// Decode engine callback
    Engine(EngineEvent),
    /// Host lifecycle signal
    System(SystemEvent),
    /// Stop the session loop
    Shutdown,
}

impl From<Command> for SessionEvent {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

/// Command surface exposed to the UI
#[derive(Debug, Clone)]
pub enum Command {
    /// Start or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle between play and pause
    PlayPause,
    /// Stop playback, keeping the queue
    Stop,
    /// Seek within the current track
    Seek(Duration),
    /// Skip to the next queue item
    SkipNext,
    /// Restart the current track or go to the previous item
    SkipPrevious,
    /// Change repeat mode
    SetRepeat(RepeatMode),
    /// Enable or disable shuffle
    SetShuffle(bool),
    /// Replace the queue and start playing at `start_index`
    PlayQueue {
        /// New queue contents
        tracks: Vec<Track>,
        /// Index to start at
        start_index: usize,
    },
    /// Replace the queue with a single track and play it
    PlayTrack(Track),
    /// Append tracks to the queue
    AddToQueue(Vec<Track>),
    /// Remove the queue item at an index
    RemoveFromQueue(usize),
    /// Move a queue item
    MoveQueueItem {
        /// Current position
        from: usize,
        /// New position
        to: usize,
    },
    /// Jump to a queue item
    SkipTo(usize),
    /// Empty the queue
    ClearQueue,
    /// Start (or replace) the sleep timer
    SetSleepTimer {
        /// Countdown length in minutes
        minutes: u32,
        /// Ramp the volume down during the final phase
        fade_out: bool,
    },
    /// Add minutes to a running sleep timer
    ExtendSleepTimer(u32),
    /// Cancel the sleep timer
    CancelSleepTimer,
    /// Change playback speed
    SetPlaybackSpeed(f32),
    /// Change output volume (0-100)
    SetVolume(u8),
    /// Retry after an error
    Retry,
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::PlayPause => "play_pause",
            Self::Stop => "stop",
            Self::Seek(_) => "seek",
            Self::SkipNext => "skip_next",
            Self::SkipPrevious => "skip_previous",
            Self::SetRepeat(_) => "set_repeat",
            Self::SetShuffle(_) => "set_shuffle",
            Self::PlayQueue { .. } => "play_queue",
            Self::PlayTrack(_) => "play_track",
            Self::AddToQueue(_) => "add_to_queue",
            Self::RemoveFromQueue(_) => "remove_from_queue",
            Self::MoveQueueItem { .. } => "move_queue_item",
            Self::SkipTo(_) => "skip_to",
            Self::ClearQueue => "clear_queue",
            Self::SetSleepTimer { .. } => "set_sleep_timer",
            Self::ExtendSleepTimer(_) => "extend_sleep_timer",
            Self::CancelSleepTimer => "cancel_sleep_timer",
            Self::SetPlaybackSpeed(_) => "set_playback_speed",
            Self::SetVolume(_) => "set_volume",
            Self::Retry => "retry",
        }
    }
}

/// Process lifecycle signals from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    /// Wired accessory unplugged; acts as an implicit pause
    AccessoryDisconnected,
    /// Headphones plugged in; may resume if configured
    HeadphonesConnected,
    /// Audio output moved to another route
    OutputRouteChanged {
        /// Whether the new route is a remote renderer
        remote: bool,
    },
}

/// Media-session and notification actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    /// `PLAY_PAUSE`
    PlayPause,
    /// `SKIP_NEXT`
    SkipNext,
    /// `SKIP_PREVIOUS`
    SkipPrevious,
    /// `SEEK_TO(position)`
    SeekTo(Duration),
    /// `STOP`
    Stop,
}

impl MediaAction {
    /// Action identifier as used on the media-session surface
    pub fn id(self) -> &'static str {
        match self {
            Self::PlayPause => "PLAY_PAUSE",
            Self::SkipNext => "SKIP_NEXT",
            Self::SkipPrevious => "SKIP_PREVIOUS",
            Self::SeekTo(_) => "SEEK_TO",
            Self::Stop => "STOP",
        }
    }

    /// Parse an identifier; `SEEK_TO` takes a position in milliseconds
    pub fn parse(id: &str, position_ms: Option<u64>) -> Option<Self> {
        match id {
            "PLAY_PAUSE" => Some(Self::PlayPause),
            "SKIP_NEXT" => Some(Self::SkipNext),
            "SKIP_PREVIOUS" => Some(Self::SkipPrevious),
            "SEEK_TO" => position_ms.map(|ms| Self::SeekTo(Duration::from_millis(ms))),
            "STOP" => Some(Self::Stop),
            _ => None,
        }
    }
}

impl From<MediaAction> for Command {
    fn from(action: MediaAction) -> Self {
        match action {
            MediaAction::PlayPause => Self::PlayPause,
            MediaAction::SkipNext => Self::SkipNext,
            MediaAction::SkipPrevious => Self::SkipPrevious,
            MediaAction::SeekTo(position) => Self::Seek(position),
            MediaAction::Stop => Self::Stop,
        }
    }
}

impl fmt::Display for MediaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeekTo(position) => write!(f, "SEEK_TO({}ms)", position.as_millis()),
            other => f.write_str(other.id()),
        }
    }
}

/// Events emitted by the state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Transport state changed
    StateChanged {
        /// Previous state
        from: TransportState,
        /// New state
        to: TransportState,
    },

    /// The current track changed
    TrackChanged {
        /// New current track
        track_id: TrackId,
        /// Previous current track
        previous_track_id: Option<TrackId>,
    },

    /// A listen ended and should be written to play history
    PlayRecorded(PlayRecord),

    /// An error was surfaced to the user
    Error {
        /// Error message
        message: String,
    },
}
