//! Property-based tests for the queue model and the state machine
//!
//! Uses proptest to verify invariants across many random inputs.

use cadence_core::{RepeatMode, Track};
use cadence_playback::{
    AudioFocus, Command, DecodeEngine, EngineEvent, Inbox, PlaybackConfig, PlaybackQueue,
    PlaybackStateMachine, SessionEvent, SleepTimer, TransportState, DEFAULT_TICK_CAPACITY,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

// ===== Helpers =====

fn tracks(len: usize) -> Vec<Track> {
    (0..len)
        .map(|i| {
            Track::new(
                format!("t{i}"),
                format!("Track {i}"),
                PathBuf::from(format!("/music/{i}.flac")),
            )
            .with_duration(Duration::from_secs(180))
        })
        .collect()
}

struct NullEngine;

impl DecodeEngine for NullEngine {
    fn load(&mut self, _generation: u64, _track: &Track, _start: Duration) {}
    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn stop(&mut self) {}
    fn seek(&mut self, _position: Duration) {}
    fn set_gain(&mut self, _gain: f32) {}
    fn set_speed(&mut self, _speed: f32) {}
}

struct AlwaysGranted;

impl AudioFocus for AlwaysGranted {
    fn request(&mut self) -> bool {
        true
    }
    fn abandon(&mut self) {}
}

/// State machine playing a single track of `duration_secs`
fn playing_machine(duration_secs: u64) -> PlaybackStateMachine {
    let (_inbox, sender) = Inbox::channel(DEFAULT_TICK_CAPACITY);
    let timer = SleepTimer::new(sender, Duration::from_secs(1), Duration::from_secs(30));
    let mut machine = PlaybackStateMachine::new(
        PlaybackConfig::default(),
        Box::new(NullEngine),
        Box::new(AlwaysGranted),
        timer,
    );

    let track = Track::new("a", "Song A", PathBuf::from("/music/a.flac"))
        .with_duration(Duration::from_secs(duration_secs));
    machine.handle(Command::PlayTrack(track).into()).unwrap();
    machine
        .handle(SessionEvent::Engine(EngineEvent::Ready {
            generation: 1,
            duration: Duration::from_secs(duration_secs),
        }))
        .unwrap();
    assert_eq!(*machine.transport(), TransportState::Playing);
    machine
}

// ===== Property Tests =====

proptest! {
    /// Property: with Repeat::All and shuffle off, every full cycle of
    /// `next()` from index 0 visits each index exactly once, then wraps to 0
    #[test]
    fn repeat_all_cycle_visits_every_index_once(len in 1usize..40, cycles in 1usize..4) {
        let mut queue = PlaybackQueue::with_seed(1);
        queue.replace(tracks(len), 0).unwrap();
        queue.set_repeat_mode(RepeatMode::All);

        for _ in 0..cycles {
            let mut visited = HashSet::new();
            visited.insert(queue.current_index().unwrap());
            for _ in 1..len {
                let index = queue.next().unwrap();
                prop_assert!(visited.insert(index), "index {} visited twice", index);
            }
            prop_assert_eq!(visited.len(), len);
            prop_assert_eq!(queue.next(), Some(0));
        }
    }

    /// Property: with shuffle on, `next()` never returns the current index
    /// unless the queue holds a single track
    #[test]
    fn shuffled_next_never_repeats_current(
        len in 1usize..30,
        start in 0usize..30,
        seed in any::<u64>(),
        steps in 1usize..100,
    ) {
        let start = start % len;
        let mut queue = PlaybackQueue::with_seed(seed);
        queue.replace(tracks(len), start).unwrap();
        queue.set_repeat_mode(RepeatMode::All);
        queue.set_shuffle(true);

        for _ in 0..steps {
            let current = queue.current_index().unwrap();
            let next = queue.next().unwrap();
            if len > 1 {
                prop_assert_ne!(next, current);
            } else {
                prop_assert_eq!(next, current);
            }
        }
    }

    /// Property: a shuffled cycle still covers every index exactly once
    #[test]
    fn shuffled_cycle_is_a_permutation(len in 1usize..30, seed in any::<u64>()) {
        let mut queue = PlaybackQueue::with_seed(seed);
        queue.replace(tracks(len), 0).unwrap();
        queue.set_shuffle(true);

        let mut visited = HashSet::new();
        visited.insert(queue.current_index().unwrap());
        while let Some(index) = queue.next() {
            prop_assert!(visited.insert(index));
        }
        prop_assert_eq!(visited.len(), len);
    }

    /// Property: the stored queue order is never touched by shuffle
    #[test]
    fn shuffle_keeps_stored_order(len in 1usize..30, seed in any::<u64>()) {
        let mut queue = PlaybackQueue::with_seed(seed);
        queue.replace(tracks(len), 0).unwrap();
        let before = queue.track_ids();

        queue.set_shuffle(true);
        queue.set_repeat_mode(RepeatMode::All);
        for _ in 0..len * 2 {
            queue.next();
        }
        queue.set_shuffle(false);

        prop_assert_eq!(queue.track_ids(), before);
    }

    /// Property: seeking clamps into [0, duration] and never changes the
    /// transport state
    #[test]
    fn seek_clamps_and_keeps_transport(duration_secs in 1u64..900, target_ms in 0u64..2_000_000) {
        let mut machine = playing_machine(duration_secs);
        let duration = Duration::from_secs(duration_secs);

        machine.handle(Command::Seek(Duration::from_millis(target_ms)).into()).unwrap();

        prop_assert_eq!(machine.position(), Duration::from_millis(target_ms).min(duration));
        prop_assert_eq!(machine.transport(), &TransportState::Playing);
    }
}
