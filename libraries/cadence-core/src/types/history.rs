//! Play history classification
//!
//! The playback core decides how a listen ended; the library persists the
//! result without re-deriving it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::TrackId;

/// Fraction of a track that must be played for a listen to count as completed
pub const COMPLETED_FRACTION: f64 = 0.8;

/// Listens that end before this fraction count as skipped
pub const SKIPPED_FRACTION: f64 = 0.1;

/// How a listen ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayOutcome {
    /// Played to at least the completion threshold
    Completed,
    /// Abandoned somewhere between the two thresholds
    Partial,
    /// Abandoned before the skip threshold
    Skipped,
}

impl PlayOutcome {
    /// Classify with the default thresholds (80 % completed, 10 % skipped)
    pub fn classify(played: Duration, duration: Duration) -> Self {
        Self::classify_with(played, duration, COMPLETED_FRACTION, SKIPPED_FRACTION)
    }

    /// Classify with explicit thresholds
    ///
    /// A track with unknown (zero) duration can't be measured and is treated
    /// as a partial listen.
    pub fn classify_with(
        played: Duration,
        duration: Duration,
        completed_fraction: f64,
        skipped_fraction: f64,
    ) -> Self {
        if duration.is_zero() {
            return Self::Partial;
        }

        let fraction = played.as_secs_f64() / duration.as_secs_f64();
        if fraction >= completed_fraction {
            Self::Completed
        } else if fraction < skipped_fraction {
            Self::Skipped
        } else {
            Self::Partial
        }
    }

    /// Whether this outcome bumps the track's play count
    pub fn counts_as_play(self) -> bool {
        self == Self::Completed
    }

    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// One entry of play history, handed to the library for write-through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    /// Track that was played
    pub track_id: TrackId,

    /// How the listen ended
    pub outcome: PlayOutcome,

    /// Position reached when the listen ended
    pub played: Duration,

    /// Track duration at the time
    pub duration: Duration,

    /// When the listen ended
    pub played_at: DateTime<Utc>,
}

impl PlayRecord {
    /// Build a record, stamping the current time
    pub fn new(track_id: TrackId, outcome: PlayOutcome, played: Duration, duration: Duration) -> Self {
        Self {
            track_id,
            outcome,
            played,
            duration,
            played_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTES_3: Duration = Duration::from_secs(180);

    #[test]
    fn eighty_five_percent_is_completed() {
        let played = MINUTES_3.mul_f64(0.85);
        assert_eq!(PlayOutcome::classify(played, MINUTES_3), PlayOutcome::Completed);
    }

    #[test]
    fn five_percent_is_skipped() {
        let played = MINUTES_3.mul_f64(0.05);
        assert_eq!(PlayOutcome::classify(played, MINUTES_3), PlayOutcome::Skipped);
    }

    #[test]
    fn thresholds_are_inclusive_for_completion_only() {
        assert_eq!(
            PlayOutcome::classify(Duration::from_secs(80), Duration::from_secs(100)),
            PlayOutcome::Completed
        );
        assert_eq!(
            PlayOutcome::classify(Duration::from_secs(10), Duration::from_secs(100)),
            PlayOutcome::Partial
        );
        assert_eq!(
            PlayOutcome::classify(Duration::from_secs(50), Duration::from_secs(100)),
            PlayOutcome::Partial
        );
    }

    #[test]
    fn unknown_duration_is_partial() {
        assert_eq!(
            PlayOutcome::classify(Duration::from_secs(50), Duration::ZERO),
            PlayOutcome::Partial
        );
    }

    #[test]
    fn only_completed_counts_as_play() {
        assert!(PlayOutcome::Completed.counts_as_play());
        assert!(!PlayOutcome::Partial.counts_as_play());
        assert!(!PlayOutcome::Skipped.counts_as_play());
    }
}
