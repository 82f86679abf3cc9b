//! Core domain types for Cadence

mod history;
mod modes;
mod resume;
mod track;

pub use history::{PlayOutcome, PlayRecord, COMPLETED_FRACTION, SKIPPED_FRACTION};
pub use modes::RepeatMode;
pub use resume::ResumeRecord;
pub use track::{Track, TrackId};
