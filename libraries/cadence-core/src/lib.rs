//! Cadence Core
//!
//! Platform-agnostic domain types and collaborator traits for the Cadence
//! local audio player.
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `RepeatMode`, `PlayRecord`, `ResumeRecord`
//! - **Collaborator Traits**: `Library` (track lookup + play history) and
//!   `ResumeStore` (the single durable resume record)
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{PlayOutcome, Track};
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let track = Track::new("a", "Intro", PathBuf::from("/music/intro.flac"))
//!     .with_duration(Duration::from_secs(200));
//!
//! let outcome = PlayOutcome::classify(Duration::from_secs(170), track.duration);
//! assert_eq!(outcome, PlayOutcome::Completed);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use memory::{InMemoryLibrary, InMemoryResumeStore};
pub use traits::{Library, ResumeStore};
pub use types::{
    PlayOutcome, PlayRecord, RepeatMode, ResumeRecord, Track, TrackId, COMPLETED_FRACTION,
    SKIPPED_FRACTION,
};
