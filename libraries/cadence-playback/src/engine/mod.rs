//! Decode engine seam
//!
//! Decoding and audio output are delegated to a platform engine. The state
//! machine drives it through [`DecodeEngine`]; the engine answers through the
//! session inbox with [`EngineEvent`]s. Every load carries a generation
//! number and every callback echoes it back, so reports from a load that was
//! cancelled or replaced are recognisable and dropped.

mod clock;

pub use clock::ClockEngine;

use cadence_core::Track;
use std::time::Duration;

/// Callback from the decode engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The track is open and ready to produce audio
    Ready {
        /// Load generation
        generation: u64,
        /// Duration reported by the decoder
        duration: Duration,
    },

    /// The track could not be opened or decoded
    Failed {
        /// Load generation
        generation: u64,
        /// Human-readable reason
        reason: String,
    },

    /// Periodic position report while playing
    Position {
        /// Load generation
        generation: u64,
        /// Current position
        position: Duration,
    },

    /// The track played to its end
    Completed {
        /// Load generation
        generation: u64,
    },
}

impl EngineEvent {
    /// Generation this event belongs to
    pub fn generation(&self) -> u64 {
        match self {
            Self::Ready { generation, .. }
            | Self::Failed { generation, .. }
            | Self::Position { generation, .. }
            | Self::Completed { generation } => *generation,
        }
    }
}

/// Platform decode engine
///
/// All methods are fire-and-forget: they must return quickly and report
/// outcomes asynchronously as [`EngineEvent`]s. Calls always refer to the
/// most recent `load`.
pub trait DecodeEngine: Send {
    /// Open `track`, positioned at `start`, and report `Ready` or `Failed`
    ///
    /// Cancels whatever was loaded before.
    fn load(&mut self, generation: u64, track: &Track, start: Duration);

    /// Start or resume audio output
    fn play(&mut self);

    /// Pause audio output, keeping the track open
    fn pause(&mut self);

    /// Cancel any in-flight load and close the track
    fn stop(&mut self);

    /// Move to `position` (already clamped to the track duration)
    fn seek(&mut self, position: Duration);

    /// Set the linear output gain
    fn set_gain(&mut self, gain: f32);

    /// Set the playback speed multiplier
    fn set_speed(&mut self, speed: f32);
}
