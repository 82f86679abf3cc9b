//! Cadence - Playback Session
//!
//! Platform-agnostic playback session coordinator for Cadence.
//!
//! This crate provides:
//! - Queue model with repeat modes (Off, One, All) and a shuffle
//!   presentation order that never reorders the stored queue
//! - Audio focus arbitration (exclusive, transient, duckable)
//! - Sleep timer with an optional fade-out ramp
//! - Output gain (logarithmic volume, focus ducking, fade)
//! - The playback state machine, the single owner of transport state
//! - Snapshot projection to media session, notification and resume record
//! - Host foreground/background lifecycle
//!
//! # Architecture
//!
//! Every input (commands, focus changes, timer ticks, decode callbacks,
//! host signals) is a [`SessionEvent`] pushed into one [`Inbox`]. A single
//! task feeds those events to the [`PlaybackStateMachine`] in order and
//! publishes a [`PlaybackSnapshot`] after each one. Projections consume the
//! snapshot stream on their own tasks.
//!
//! Audio decoding is behind the [`DecodeEngine`] trait; [`ClockEngine`] is
//! a reference engine that keeps time without producing sound.
//!
//! # Example: Queue navigation
//!
//! ```rust
//! use cadence_core::{RepeatMode, Track};
//! use cadence_playback::PlaybackQueue;
//! use std::path::PathBuf;
//!
//! let mut queue = PlaybackQueue::new();
//! queue
//!     .replace(
//!         vec![
//!             Track::new("a", "First", PathBuf::from("/music/a.flac")),
//!             Track::new("b", "Second", PathBuf::from("/music/b.flac")),
//!         ],
//!         0,
//!     )
//!     .unwrap();
//!
//! queue.set_repeat_mode(RepeatMode::All);
//! assert_eq!(queue.next(), Some(1));
//! assert_eq!(queue.next(), Some(0));
//! ```
//!
//! # Example: Running a session
//!
//! ```rust,no_run
//! use cadence_core::{InMemoryLibrary, InMemoryResumeStore, Track};
//! use cadence_playback::{Command, PlaybackConfig, SessionBuilder};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn run() -> cadence_playback::Result<()> {
//! let session = SessionBuilder::new(
//!     PlaybackConfig::default(),
//!     Arc::new(InMemoryLibrary::new()),
//!     Arc::new(InMemoryResumeStore::new()),
//! )
//! .start()
//! .await?;
//!
//! session.command(Command::PlayTrack(Track::from_path(PathBuf::from(
//!     "/music/song.flac",
//! ))))?;
//! println!("{}", session.snapshot().transport);
//!
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
mod error;
pub mod events;
pub mod focus;
pub mod host;
mod inbox;
mod machine;
pub mod projector;
mod queue;
mod session;
mod shuffle;
pub mod sleep_timer;
mod snapshot;
pub mod types;
mod volume;

// Public exports
pub use engine::{ClockEngine, DecodeEngine, EngineEvent};
pub use error::{PlaybackError, Result};
pub use events::{Command, MediaAction, PlaybackEvent, SessionEvent, SystemEvent};
pub use focus::{AudioFocus, FocusArbiter, FocusGain, FocusHandle, FocusListener};
pub use host::{HostAction, HostLifecycle, HostMode, HostService};
pub use inbox::{EventSender, Inbox, DEFAULT_TICK_CAPACITY};
pub use machine::{PlaybackStateMachine, MAX_SPEED, MIN_SPEED};
pub use projector::{
    Capabilities, MediaSessionSink, MediaSessionState, Notification, NotificationSink,
    NotificationUpdate, SessionProjector,
};
pub use queue::{PlaybackQueue, Removal};
pub use session::{SessionBuilder, SessionHandle};
pub use sleep_timer::{SleepTimer, SleepTimerEvent, SleepTimerState};
pub use snapshot::PlaybackSnapshot;
pub use types::{AudioFocusState, ErrorReason, PlaybackConfig, StopCause, TransportState};
pub use volume::OutputGain;
