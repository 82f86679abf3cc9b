//! Ordered playback queue
//!
//! Holds the stored track order, the current index and the shuffle/repeat
//! modes. No I/O and no audio side effects; the state machine decides what
//! a changed index means for the transport.

use cadence_core::{RepeatMode, Track, TrackId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use crate::error::{PlaybackError, Result};
use crate::shuffle::{relocated, ShuffleOrder};

/// Result of removing a queue item
#[derive(Debug, Clone)]
pub struct Removal {
    /// The removed track
    pub track: Arc<Track>,

    /// Whether the current track is now a different one (or none)
    pub active_changed: bool,
}

/// Ordered playback queue
///
/// Invariant: `current` is `None` exactly when the queue is empty, and is
/// otherwise a valid index into `tracks`.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    /// Stored order
    tracks: Vec<Arc<Track>>,

    /// Track ids in stored order, shared with snapshots
    ids: Arc<[TrackId]>,

    /// Current index
    current: Option<usize>,

    /// Repeat mode
    repeat: RepeatMode,

    /// Whether shuffle is enabled
    shuffle: bool,

    /// Presentation order consulted while shuffle is enabled
    order: ShuffleOrder,

    rng: StdRng,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty queue with a deterministic shuffle
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            ids: Arc::from(Vec::new()),
            current: None,
            repeat: RepeatMode::Off,
            shuffle: false,
            order: ShuffleOrder::default(),
            rng,
        }
    }

    // ===== Queries =====

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current index
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Current track
    pub fn current_track(&self) -> Option<&Arc<Track>> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Track at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<Track>> {
        self.tracks.get(index)
    }

    /// All tracks in stored order
    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    /// Track ids in stored order (cheap to clone)
    pub fn track_ids(&self) -> Arc<[TrackId]> {
        Arc::clone(&self.ids)
    }

    /// Repeat mode
    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    /// Whether shuffle is enabled
    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Shuffle presentation order (empty when shuffle is off)
    pub fn presentation_order(&self) -> &[usize] {
        if self.shuffle {
            self.order.order()
        } else {
            &[]
        }
    }

    /// Whether `next()` would produce an index
    pub fn has_next(&self) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        if self.repeat != RepeatMode::Off {
            return true;
        }
        if self.shuffle {
            self.order.has_next()
        } else {
            current + 1 < self.tracks.len()
        }
    }

    /// Whether `previous()` would produce an index
    pub fn has_previous(&self) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        if self.repeat != RepeatMode::Off {
            return true;
        }
        if self.shuffle {
            self.order.has_previous()
        } else {
            current > 0
        }
    }

    // ===== Mutation =====

    /// Replace the whole queue and start at `start_index`
    pub fn replace(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        if tracks.is_empty() {
            self.clear();
            return Err(PlaybackError::QueueEmpty);
        }
        if start_index >= tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(start_index));
        }

        self.tracks = tracks.into_iter().map(Arc::new).collect();
        self.current = Some(start_index);
        self.reroll();
        self.refresh_ids();
        Ok(())
    }

    /// Append a single track
    pub fn append(&mut self, track: Track) {
        self.append_all(vec![track]);
    }

    /// Append a batch of tracks
    ///
    /// Appending to an empty queue makes the first appended track current.
    pub fn append_all(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let was_empty = self.tracks.is_empty();

        for track in tracks {
            let index = self.tracks.len();
            self.tracks.push(Arc::new(track));
            if self.shuffle && !was_empty {
                self.order.insert(index, &mut self.rng);
            }
        }

        if was_empty {
            self.current = Some(0);
            self.reroll();
        }
        self.refresh_ids();
    }

    /// Remove the track at `index`
    ///
    /// Removing an item before the current one shifts the current index down
    /// so it keeps pointing at the same track. Removing the current item makes
    /// the track that slid into its slot current, clamped to the new end.
    pub fn remove_at(&mut self, index: usize) -> Result<Removal> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }

        let track = self.tracks.remove(index);
        let current = self.current.unwrap_or(0);

        let (new_current, active_changed) = if self.tracks.is_empty() {
            (None, true)
        } else if index < current {
            (Some(current - 1), false)
        } else if index > current {
            (Some(current), false)
        } else {
            (Some(index.min(self.tracks.len() - 1)), true)
        };

        self.current = new_current;
        if self.shuffle {
            self.order.remove(index);
            if let (true, Some(current)) = (active_changed, new_current) {
                self.order.place_at_cursor(current);
            }
        }
        self.refresh_ids();

        Ok(Removal {
            track,
            active_changed,
        })
    }

    /// Move the item at `from` to position `to`
    ///
    /// The current index follows its track; moving never changes which track
    /// is active.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.tracks.len();
        if from >= len {
            return Err(PlaybackError::IndexOutOfBounds(from));
        }
        if to >= len {
            return Err(PlaybackError::IndexOutOfBounds(to));
        }
        if from == to {
            return Ok(());
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        self.current = self.current.map(|c| relocated(c, from, to));
        if self.shuffle {
            self.order.relocate(from, to);
        }
        self.refresh_ids();
        Ok(())
    }

    /// Make `index` the current item
    pub fn set_index(&mut self, index: usize) -> Result<()> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.current = Some(index);
        if self.shuffle {
            self.order.focus(index);
        }
        Ok(())
    }

    /// Set repeat mode
    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Enable or disable shuffle
    ///
    /// Every transition to enabled rolls a new presentation order.
    pub fn set_shuffle(&mut self, enabled: bool) {
        if self.shuffle == enabled {
            return;
        }
        self.shuffle = enabled;
        self.reroll();
    }

    /// Remove every track
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.order.clear();
        self.refresh_ids();
    }

    // ===== Navigation =====

    /// Resolve and move to the next index for automatic advance
    ///
    /// `Repeat::One` returns the current index unchanged. At the end of the
    /// order `Repeat::All` wraps and `Repeat::Off` returns `None`, which means
    /// the queue ended naturally.
    pub fn next(&mut self) -> Option<usize> {
        let current = self.current?;
        if self.repeat == RepeatMode::One {
            return Some(current);
        }
        self.step_forward(self.repeat == RepeatMode::All)
    }

    /// Resolve and move to the previous index
    pub fn previous(&mut self) -> Option<usize> {
        self.current?;
        self.step_back(self.repeat != RepeatMode::Off)
    }

    /// Resolve and move to the next index for an explicit user skip
    ///
    /// Unlike `next()`, `Repeat::One` does not pin the current track here;
    /// it wraps like `Repeat::All`.
    pub fn skip_next(&mut self) -> Option<usize> {
        self.current?;
        self.step_forward(self.repeat != RepeatMode::Off)
    }

    fn step_forward(&mut self, wrap: bool) -> Option<usize> {
        let current = self.current?;
        let len = self.tracks.len();

        let next = if self.shuffle {
            match self.order.next() {
                Some(i) => Some(i),
                None if wrap => {
                    // Cycle finished: new order starting from the current
                    // track, so the pick after it is never the current one.
                    self.order = ShuffleOrder::roll(len, Some(current), &mut self.rng);
                    self.order.next().or(Some(current))
                }
                None => None,
            }
        } else if current + 1 < len {
            Some(current + 1)
        } else if wrap {
            Some(0)
        } else {
            None
        };

        if next.is_some() {
            self.current = next;
        }
        next
    }

    fn step_back(&mut self, wrap: bool) -> Option<usize> {
        let current = self.current?;
        let len = self.tracks.len();

        let previous = if self.shuffle {
            match self.order.previous() {
                Some(i) => Some(i),
                None if wrap => self.order.last(),
                None => None,
            }
        } else if current > 0 {
            Some(current - 1)
        } else if wrap {
            Some(len - 1)
        } else {
            None
        };

        if previous.is_some() {
            self.current = previous;
        }
        previous
    }

    fn reroll(&mut self) {
        self.order = if self.shuffle {
            ShuffleOrder::roll(self.tracks.len(), self.current, &mut self.rng)
        } else {
            ShuffleOrder::default()
        };
    }

    fn refresh_ids(&mut self) {
        self.ids = self.tracks.iter().map(|t| t.id.clone()).collect();
    }
}
