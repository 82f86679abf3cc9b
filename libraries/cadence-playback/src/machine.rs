//! Playback state machine
//!
//! Sole owner of the transport state. It is driven one event at a time by
//! the session loop and never blocks: engine, focus and timer calls are
//! fire-and-forget, and their outcomes come back later as events.
//!
//! Side effects visible to the outside are queued as [`PlaybackEvent`]s and
//! drained by the session after every event; the latest [`PlaybackSnapshot`]
//! is rebuilt after every event as well.

use cadence_core::{PlayOutcome, PlayRecord, ResumeRecord, Track, TrackId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::engine::{DecodeEngine, EngineEvent};
use crate::error::{PlaybackError, Result};
use crate::events::{Command, PlaybackEvent, SessionEvent, SystemEvent};
use crate::focus::AudioFocus;
use crate::queue::PlaybackQueue;
use crate::sleep_timer::{SleepTimer, SleepTimerEvent};
use crate::snapshot::PlaybackSnapshot;
use crate::types::{AudioFocusState, ErrorReason, PlaybackConfig, StopCause, TransportState};
use crate::volume::OutputGain;

/// Slowest accepted playback speed
pub const MIN_SPEED: f32 = 0.25;

/// Fastest accepted playback speed
pub const MAX_SPEED: f32 = 4.0;

/// Why the transport is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseReason {
    User,
    Focus,
    Accessory,
    Route,
}

/// Playback state machine
pub struct PlaybackStateMachine {
    config: PlaybackConfig,
    queue: PlaybackQueue,
    transport: TransportState,

    // Position within the loaded (or about to be loaded) track
    position: Duration,
    // Duration reported by the engine for the loaded track
    duration: Duration,
    speed: f32,
    gain: OutputGain,

    focus: Box<dyn AudioFocus>,
    focus_state: AudioFocusState,
    engine: Box<dyn DecodeEngine>,
    sleep_timer: SleepTimer,

    // Load generation; engine callbacks from older loads are dropped
    generation: u64,
    // Track handed to the engine by the last load
    active: Option<Arc<Track>>,
    last_track_id: Option<TrackId>,
    // Whether the active load has produced audio (worth a history entry)
    started: bool,
    play_when_ready: bool,
    pause_reason: Option<PauseReason>,
    // Tracks that already triggered an automatic skip
    failed_tracks: HashSet<TrackId>,
    // Tracks that completed without any length to play
    empty_tracks: HashSet<TrackId>,
    stop_cause: Option<StopCause>,

    pending_events: Vec<PlaybackEvent>,
    snapshot: PlaybackSnapshot,
    force_revision: bool,
}

impl PlaybackStateMachine {
    /// Create an idle state machine
    pub fn new(
        config: PlaybackConfig,
        engine: Box<dyn DecodeEngine>,
        focus: Box<dyn AudioFocus>,
        sleep_timer: SleepTimer,
    ) -> Self {
        let mut queue = PlaybackQueue::new();
        queue.set_repeat_mode(config.repeat);
        queue.set_shuffle(config.shuffle);
        Self::with_queue(config, queue, engine, focus, sleep_timer)
    }

    /// Create an idle state machine around an existing (usually empty) queue
    pub fn with_queue(
        config: PlaybackConfig,
        queue: PlaybackQueue,
        mut engine: Box<dyn DecodeEngine>,
        focus: Box<dyn AudioFocus>,
        sleep_timer: SleepTimer,
    ) -> Self {
        let gain = OutputGain::new(config.volume, config.duck_level);
        engine.set_gain(gain.gain());

        let mut machine = Self {
            config,
            queue,
            transport: TransportState::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            speed: 1.0,
            gain,
            focus,
            focus_state: AudioFocusState::None,
            engine,
            sleep_timer,
            generation: 0,
            active: None,
            last_track_id: None,
            started: false,
            play_when_ready: false,
            pause_reason: None,
            failed_tracks: HashSet::new(),
            empty_tracks: HashSet::new(),
            stop_cause: None,
            pending_events: Vec::new(),
            snapshot: PlaybackSnapshot::default(),
            force_revision: false,
        };
        machine.snapshot = machine.build_snapshot(0);
        machine
    }

    // ===== Queries =====

    /// Transport state
    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    /// Queue model
    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    /// Position within the current track
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Audio focus as last reported
    pub fn focus_state(&self) -> AudioFocusState {
        self.focus_state
    }

    /// Effective output gain handed to the engine
    pub fn output_gain(&self) -> f32 {
        self.gain.gain()
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Check if there are pending events
    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    // ===== Event handling =====

    /// Process one inbound event
    ///
    /// Errors are returned for rejected commands; the state is left
    /// unchanged in that case. Commands that hit an empty queue are no-ops.
    pub fn handle(&mut self, event: SessionEvent) -> Result<()> {
        let result = match event {
            SessionEvent::Command(command) => {
                let name = command.name();
                match self.handle_command(command) {
                    Err(PlaybackError::QueueEmpty) => {
                        debug!(command = name, "Ignoring command: queue is empty");
                        Ok(())
                    }
                    other => other,
                }
            }
            SessionEvent::Focus(state) => {
                self.on_focus_change(state);
                Ok(())
            }
            SessionEvent::SleepTimer(event) => {
                self.on_sleep_timer(event);
                Ok(())
            }
            SessionEvent::Engine(event) => {
                self.on_engine_event(event);
                Ok(())
            }
            SessionEvent::System(event) => {
                self.on_system_event(event);
                Ok(())
            }
            SessionEvent::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };

        self.refresh_snapshot();
        result
    }

    /// Pre-populate the queue from a resume record without playing
    ///
    /// `tracks` are the record's queue ids that still resolve, in order.
    /// Only valid while idle.
    pub fn restore(&mut self, tracks: Vec<Track>, record: &ResumeRecord) -> Result<()> {
        if self.transport != TransportState::Idle {
            return Err(PlaybackError::InvalidOperation(
                "resume record can only be restored while idle".to_string(),
            ));
        }

        self.queue.set_repeat_mode(record.repeat_mode);
        if tracks.is_empty() {
            self.refresh_snapshot();
            return Ok(());
        }

        let saved = record
            .track_id
            .as_ref()
            .and_then(|id| tracks.iter().position(|t| &t.id == id));
        let index = saved
            .or(record.queue_index)
            .unwrap_or(0)
            .min(tracks.len() - 1);

        self.queue.replace(tracks, index)?;
        self.queue.set_shuffle(record.shuffle);
        self.position = if saved.is_some() {
            self.clamp_to_duration(record.position())
        } else {
            Duration::ZERO
        };

        info!(
            queue_len = self.queue.len(),
            index,
            position_ms = self.position.as_millis() as u64,
            "Restored playback context"
        );
        self.refresh_snapshot();
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> Result<()> {
        trace!(command = command.name(), "Command");
        match command {
            Command::Play => self.play(),
            Command::Pause => {
                self.pause_with(PauseReason::User);
                Ok(())
            }
            Command::PlayPause => {
                let playing = self.transport == TransportState::Playing
                    || (self.transport == TransportState::Buffering && self.play_when_ready);
                if playing {
                    self.pause_with(PauseReason::User);
                    Ok(())
                } else {
                    self.play()
                }
            }
            Command::Stop => {
                self.stop();
                Ok(())
            }
            Command::Seek(position) => self.seek(position),
            Command::SkipNext => self.skip_next(),
            Command::SkipPrevious => self.skip_previous(),
            Command::SetRepeat(mode) => {
                self.queue.set_repeat_mode(mode);
                Ok(())
            }
            Command::SetShuffle(enabled) => {
                self.queue.set_shuffle(enabled);
                Ok(())
            }
            Command::PlayQueue {
                tracks,
                start_index,
            } => self.play_queue(tracks, start_index),
            Command::PlayTrack(track) => self.play_queue(vec![track], 0),
            Command::AddToQueue(tracks) => {
                self.queue.append_all(tracks);
                Ok(())
            }
            Command::RemoveFromQueue(index) => self.remove_from_queue(index),
            Command::MoveQueueItem { from, to } => self.queue.move_item(from, to),
            Command::SkipTo(index) => {
                self.queue.set_index(index)?;
                self.reload_current()
            }
            Command::ClearQueue => {
                if self.has_loaded_track() {
                    self.halt(StopCause::QueueEnded);
                }
                self.queue.clear();
                self.position = Duration::ZERO;
                Ok(())
            }
            Command::SetSleepTimer { minutes, fade_out } => {
                if minutes == 0 {
                    return Err(PlaybackError::InvalidOperation(
                        "sleep timer needs at least one minute".to_string(),
                    ));
                }
                self.sleep_timer.start(minutes, fade_out);
                self.clear_fade();
                Ok(())
            }
            Command::ExtendSleepTimer(minutes) => {
                if self.sleep_timer.extend(minutes) {
                    self.clear_fade();
                } else {
                    debug!("No sleep timer running; extend ignored");
                }
                Ok(())
            }
            Command::CancelSleepTimer => {
                self.sleep_timer.stop();
                self.clear_fade();
                Ok(())
            }
            Command::SetPlaybackSpeed(speed) => self.set_speed(speed),
            Command::SetVolume(level) => {
                self.gain.set_level(level);
                self.apply_gain();
                Ok(())
            }
            Command::Retry => self.retry(),
        }
    }

    // ===== Transport =====

    fn play(&mut self) -> Result<()> {
        match self.transport {
            TransportState::Playing => Ok(()),
            TransportState::Buffering => {
                self.play_when_ready = true;
                self.pause_reason = None;
                Ok(())
            }
            TransportState::Paused => {
                self.resume();
                Ok(())
            }
            TransportState::Idle | TransportState::Stopped => self.load_current(self.position, true),
            TransportState::Error(_) => self.retry(),
        }
    }

    fn retry(&mut self) -> Result<()> {
        let TransportState::Error(reason) = &self.transport else {
            debug!(state = %self.transport, "Nothing to retry");
            return Ok(());
        };
        if let ErrorReason::DecodeFailure { track_id, .. } = reason {
            let track_id = track_id.clone();
            self.failed_tracks.remove(&track_id);
        }
        self.load_current(self.position, true)
    }

    fn resume(&mut self) {
        if !self.request_focus() {
            self.fail(ErrorReason::FocusDenied);
            return;
        }
        self.engine.play();
        self.started = true;
        self.pause_reason = None;
        self.stop_cause = None;
        self.transition(TransportState::Playing);
    }

    fn pause_with(&mut self, reason: PauseReason) {
        match self.transport {
            TransportState::Playing => {
                self.engine.pause();
                self.pause_reason = Some(reason);
                self.transition(TransportState::Paused);
            }
            TransportState::Buffering => {
                self.play_when_ready = false;
                self.pause_reason = Some(reason);
            }
            TransportState::Paused if reason == PauseReason::User => {
                // An explicit pause overrides any pending automatic resume
                self.pause_reason = Some(PauseReason::User);
            }
            _ => {}
        }
    }

    fn stop(&mut self) {
        match self.transport {
            TransportState::Buffering | TransportState::Playing | TransportState::Paused => {
                self.halt(StopCause::User);
            }
            TransportState::Stopped => {
                self.stop_cause = Some(StopCause::User);
            }
            TransportState::Idle | TransportState::Error(_) => {
                debug!(state = %self.transport, "Stop ignored");
            }
        }
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        let target = self.clamp_to_duration(position);
        self.position = target;
        if self.has_loaded_track() {
            self.engine.seek(target);
        }
        self.force_revision = true;
        debug!(position_ms = target.as_millis() as u64, "Seek");
        Ok(())
    }

    fn skip_next(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if self.queue.skip_next().is_none() {
            debug!("Already at the end of the queue");
            return Ok(());
        }
        self.reload_current()
    }

    fn skip_previous(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if self.has_loaded_track() && self.position > self.config.previous_restart() {
            return self.seek(Duration::ZERO);
        }
        if self.queue.previous().is_none() {
            return self.seek(Duration::ZERO);
        }
        self.reload_current()
    }

    fn set_speed(&mut self, speed: f32) -> Result<()> {
        if self.transport.is_error() {
            return Err(PlaybackError::InvalidOperation(
                "playback speed cannot change in the error state".to_string(),
            ));
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PlaybackError::InvalidOperation(format!(
                "invalid playback speed {speed}"
            )));
        }
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.engine.set_speed(self.speed);
        Ok(())
    }

    // ===== Queue changes =====

    fn play_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if start_index >= tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(start_index));
        }

        self.record_listen();
        self.failed_tracks.clear();
        self.empty_tracks.clear();
        self.queue.replace(tracks, start_index)?;
        self.load_current(Duration::ZERO, true)
    }

    fn remove_from_queue(&mut self, index: usize) -> Result<()> {
        let removal = self.queue.remove_at(index)?;
        debug!(index, track_id = %removal.track.id, "Removed from queue");
        if !removal.active_changed {
            return Ok(());
        }

        if self.queue.is_empty() {
            if self.has_loaded_track() {
                self.halt(StopCause::QueueEnded);
            }
            self.position = Duration::ZERO;
            return Ok(());
        }
        self.reload_current()
    }

    /// Follow a change of the current queue index
    ///
    /// A loaded track is replaced through `Buffering`, keeping the
    /// playing/paused intent. Without a loaded track only the position resets.
    fn reload_current(&mut self) -> Result<()> {
        match self.transport {
            TransportState::Playing | TransportState::Buffering => {
                let play = self.transport == TransportState::Playing || self.play_when_ready;
                self.record_listen();
                self.load_current(Duration::ZERO, play)
            }
            TransportState::Paused => {
                self.record_listen();
                self.load_current(Duration::ZERO, false)
            }
            TransportState::Idle | TransportState::Stopped | TransportState::Error(_) => {
                self.position = Duration::ZERO;
                Ok(())
            }
        }
    }

    // ===== Inbound events =====

    fn on_engine_event(&mut self, event: EngineEvent) {
        if event.generation() != self.generation {
            trace!(
                generation = event.generation(),
                current = self.generation,
                "Dropping stale engine event"
            );
            return;
        }

        match event {
            EngineEvent::Ready { duration, .. } => self.on_ready(duration),
            EngineEvent::Failed { reason, .. } => self.on_decode_failure(reason),
            EngineEvent::Position { position, .. } => {
                if self.transport == TransportState::Playing {
                    self.position = self.clamp_to_duration(position);
                    trace!(position_ms = self.position.as_millis() as u64, "Position");
                }
            }
            EngineEvent::Completed { .. } => {
                if self.transport == TransportState::Playing {
                    self.on_track_completed();
                }
            }
        }
    }

    fn on_ready(&mut self, duration: Duration) {
        if self.transport != TransportState::Buffering {
            return;
        }
        if !duration.is_zero() {
            self.duration = duration;
        }

        if self.play_when_ready {
            self.resume();
        } else {
            self.transition(TransportState::Paused);
        }
    }

    fn on_decode_failure(&mut self, reason: String) {
        let Some(track) = self.active.clone() else {
            return;
        };
        let play = self.play_when_ready;
        let first_failure = self.failed_tracks.insert(track.id.clone());

        self.fail(ErrorReason::DecodeFailure {
            track_id: track.id.clone(),
            reason,
        });

        if !first_failure {
            debug!(track_id = %track.id, "Track failed again; staying in error");
            return;
        }
        if self.queue.skip_next().is_some() {
            info!(track_id = %track.id, "Skipping undecodable track");
            // Focus denial here lands in the error state on its own
            let _ = self.load_current(Duration::ZERO, play);
        }
    }

    fn on_track_completed(&mut self) {
        if self.duration.is_zero() {
            self.on_empty_completion();
            return;
        }
        self.position = self.duration;
        self.record_listen();
        self.empty_tracks.clear();

        if self.queue.next().is_some() {
            let _ = self.load_current(Duration::ZERO, true);
        } else {
            info!("Reached the end of the queue");
            self.halt(StopCause::QueueEnded);
        }
    }

    /// A track without length finished instantly
    ///
    /// Repeat would replay it in a tight loop, so each such track is skipped
    /// past at most once per queue; the second time the transport stops.
    fn on_empty_completion(&mut self) {
        let Some(track) = self.active.clone() else {
            return;
        };
        self.record_listen();

        if !self.empty_tracks.insert(track.id.clone()) {
            info!(track_id = %track.id, "Empty track completed again; stopping");
            self.halt(StopCause::QueueEnded);
            return;
        }
        warn!(track_id = %track.id, "Track completed without a duration");
        if self.queue.skip_next().is_some() {
            let _ = self.load_current(Duration::ZERO, true);
        } else {
            self.halt(StopCause::QueueEnded);
        }
    }

    fn on_focus_change(&mut self, state: AudioFocusState) {
        debug!(?state, "Focus change");
        match state {
            AudioFocusState::Gained => {
                self.focus_state = AudioFocusState::Gained;
                self.gain.set_ducked(false);
                self.apply_gain();
                if self.pause_reason == Some(PauseReason::Focus) {
                    match self.transport {
                        TransportState::Paused => self.resume(),
                        TransportState::Buffering => {
                            self.play_when_ready = true;
                            self.pause_reason = None;
                        }
                        _ => {}
                    }
                }
            }
            AudioFocusState::LostTransient => {
                self.focus_state = state;
                self.pause_with(PauseReason::Focus);
            }
            AudioFocusState::LostTransientDuckable => {
                self.focus_state = state;
                self.gain.set_ducked(true);
                self.apply_gain();
            }
            AudioFocusState::LostPermanent => {
                if self.has_loaded_track() {
                    self.halt(StopCause::FocusLost);
                } else {
                    self.focus.abandon();
                }
                self.pause_reason = None;
                self.focus_state = AudioFocusState::LostPermanent;
            }
            AudioFocusState::None => {
                self.focus_state = AudioFocusState::None;
            }
        }
    }

    fn on_sleep_timer(&mut self, event: SleepTimerEvent) {
        match event {
            SleepTimerEvent::Tick { fade, .. } => {
                if !self.sleep_timer.accepts(&event) {
                    return;
                }
                if let Some(progress) = fade {
                    self.gain.set_fade(progress);
                    self.apply_gain();
                }
            }
            SleepTimerEvent::Expired { generation } => {
                if !self.sleep_timer.expire(generation) {
                    return;
                }
                if self.has_loaded_track() {
                    self.halt(StopCause::SleepTimer);
                } else {
                    self.clear_fade();
                }
            }
        }
    }

    fn on_system_event(&mut self, event: SystemEvent) {
        debug!(?event, "System event");
        match event {
            SystemEvent::AccessoryDisconnected => self.pause_with(PauseReason::Accessory),
            SystemEvent::HeadphonesConnected => {
                let auto_paused = self
                    .pause_reason
                    .is_some_and(|reason| reason != PauseReason::User);
                if self.config.resume_on_headphones
                    && self.transport == TransportState::Paused
                    && self.queue.current_track().is_some()
                    && auto_paused
                {
                    self.resume();
                }
            }
            SystemEvent::OutputRouteChanged { remote: true } => {
                self.pause_with(PauseReason::Route);
            }
            SystemEvent::OutputRouteChanged { remote: false } => {}
        }
    }

    fn shutdown(&mut self) {
        info!("Playback session shutting down");
        self.record_listen();
        self.engine.stop();
        self.generation += 1;
        self.active = None;
        self.sleep_timer.stop();
        self.focus.abandon();
        self.focus_state = AudioFocusState::None;
    }

    // ===== Internals =====

    /// Load the current queue item and enter `Buffering`
    ///
    /// Focus is requested up front when playback should start; a denial
    /// lands in the error state instead.
    fn load_current(&mut self, start: Duration, play_when_ready: bool) -> Result<()> {
        let Some(track) = self.queue.current_track().cloned() else {
            return Err(PlaybackError::QueueEmpty);
        };
        if play_when_ready && !self.request_focus() {
            self.fail(ErrorReason::FocusDenied);
            return Ok(());
        }

        if self.last_track_id.as_ref() != Some(&track.id) {
            self.pending_events.push(PlaybackEvent::TrackChanged {
                track_id: track.id.clone(),
                previous_track_id: self.last_track_id.replace(track.id.clone()),
            });
        }

        self.generation += 1;
        self.duration = track.duration;
        self.position = self.clamp_to_duration(start);
        self.started = false;
        self.play_when_ready = play_when_ready;
        if play_when_ready {
            self.pause_reason = None;
        }
        self.stop_cause = None;
        self.engine.load(self.generation, &track, self.position);
        self.active = Some(track);
        self.transition(TransportState::Buffering);
        Ok(())
    }

    /// Stop the transport, releasing the engine, focus and sleep timer
    fn halt(&mut self, cause: StopCause) {
        self.record_listen();
        self.engine.stop();
        self.generation += 1;
        self.active = None;
        self.sleep_timer.stop();
        self.clear_fade();
        self.release_focus();
        self.play_when_ready = false;
        self.pause_reason = None;
        // Other stops keep the position for the resume record and the next play
        if cause == StopCause::QueueEnded {
            self.position = Duration::ZERO;
        }
        self.stop_cause = Some(cause);
        info!(?cause, "Playback stopped");
        self.transition(TransportState::Stopped);
    }

    fn fail(&mut self, reason: ErrorReason) {
        warn!(%reason, "Playback error");
        self.engine.stop();
        self.generation += 1;
        self.active = None;
        self.started = false;
        self.release_focus();
        self.play_when_ready = false;
        self.pause_reason = None;
        self.pending_events.push(PlaybackEvent::Error {
            message: reason.to_string(),
        });
        self.transition(TransportState::Error(reason));
    }

    /// Queue a history entry for the active load, if it produced audio
    fn record_listen(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        let Some(track) = self.active.as_ref() else {
            return;
        };

        let outcome = PlayOutcome::classify_with(
            self.position,
            self.duration,
            self.config.completed_fraction,
            self.config.skipped_fraction,
        );
        debug!(
            track_id = %track.id,
            outcome = outcome.as_str(),
            played_ms = self.position.as_millis() as u64,
            "Listen ended"
        );
        self.pending_events.push(PlaybackEvent::PlayRecorded(PlayRecord::new(
            track.id.clone(),
            outcome,
            self.position,
            self.duration,
        )));
    }

    fn request_focus(&mut self) -> bool {
        if self.focus.request() {
            self.focus_state = AudioFocusState::Gained;
            self.gain.set_ducked(false);
            self.apply_gain();
            true
        } else {
            warn!("Audio focus denied");
            false
        }
    }

    fn release_focus(&mut self) {
        self.focus.abandon();
        self.focus_state = AudioFocusState::None;
    }

    fn clear_fade(&mut self) {
        self.gain.reset_fade();
        self.apply_gain();
    }

    fn apply_gain(&mut self) {
        self.engine.set_gain(self.gain.gain());
    }

    fn has_loaded_track(&self) -> bool {
        matches!(
            self.transport,
            TransportState::Buffering | TransportState::Playing | TransportState::Paused
        )
    }

    /// Duration of the current track: engine-reported when loaded, catalogued otherwise
    fn current_duration(&self) -> Duration {
        if self.active.is_some() {
            self.duration
        } else {
            self.queue
                .current_track()
                .map_or(Duration::ZERO, |t| t.duration)
        }
    }

    fn clamp_to_duration(&self, position: Duration) -> Duration {
        let duration = self.current_duration();
        if duration.is_zero() {
            position
        } else {
            position.min(duration)
        }
    }

    fn transition(&mut self, to: TransportState) {
        if self.transport == to {
            return;
        }
        let from = std::mem::replace(&mut self.transport, to.clone());
        debug!(from = %from, to = %to, "Transport transition");
        self.pending_events
            .push(PlaybackEvent::StateChanged { from, to });
    }

    fn build_snapshot(&self, revision: u64) -> PlaybackSnapshot {
        PlaybackSnapshot {
            revision,
            track: self.queue.current_track().cloned(),
            position: self.position,
            duration: self.current_duration(),
            transport: self.transport.clone(),
            queue: self.queue.track_ids(),
            queue_index: self.queue.current_index(),
            repeat: self.queue.repeat_mode(),
            shuffle: self.queue.is_shuffled(),
            volume: self.gain.level(),
            speed: self.speed,
            focus: self.focus_state,
            sleep_timer: self.sleep_timer.state(),
            stop_cause: self.stop_cause,
        }
    }

    fn refresh_snapshot(&mut self) {
        let mut next = self.build_snapshot(self.snapshot.revision);
        if self.force_revision || !next.same_state(&self.snapshot) {
            next.revision += 1;
        }
        self.force_revision = false;
        self.snapshot = next;
    }
}

impl std::fmt::Debug for PlaybackStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackStateMachine")
            .field("transport", &self.transport)
            .field("queue_len", &self.queue.len())
            .field("queue_index", &self.queue.current_index())
            .field("position", &self.position)
            .field("generation", &self.generation)
            .field("focus", &self.focus_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::{Inbox, DEFAULT_TICK_CAPACITY};
    use cadence_core::RepeatMode;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(u64, String, Duration),
        Play,
        Pause,
        Stop,
        Seek(Duration),
        Speed(f32),
    }

    #[derive(Clone, Default)]
    struct RecordingEngine {
        calls: Arc<Mutex<Vec<Call>>>,
        gain: Arc<Mutex<f32>>,
    }

    impl RecordingEngine {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn last_load(&self) -> Option<(u64, String)> {
            self.calls().into_iter().rev().find_map(|c| match c {
                Call::Load(generation, id, _) => Some((generation, id)),
                _ => None,
            })
        }

        fn gain(&self) -> f32 {
            *self.gain.lock().unwrap()
        }
    }

    impl DecodeEngine for RecordingEngine {
        fn load(&mut self, generation: u64, track: &Track, start: Duration) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Load(generation, track.id.to_string(), start));
        }
        fn play(&mut self) {
            self.calls.lock().unwrap().push(Call::Play);
        }
        fn pause(&mut self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }
        fn stop(&mut self) {
            self.calls.lock().unwrap().push(Call::Stop);
        }
        fn seek(&mut self, position: Duration) {
            self.calls.lock().unwrap().push(Call::Seek(position));
        }
        fn set_gain(&mut self, gain: f32) {
            *self.gain.lock().unwrap() = gain;
        }
        fn set_speed(&mut self, speed: f32) {
            self.calls.lock().unwrap().push(Call::Speed(speed));
        }
    }

    #[derive(Clone)]
    struct SwitchFocus {
        grant: Arc<Mutex<bool>>,
        abandons: Arc<Mutex<usize>>,
    }

    impl SwitchFocus {
        fn granting() -> Self {
            Self {
                grant: Arc::new(Mutex::new(true)),
                abandons: Arc::new(Mutex::new(0)),
            }
        }

        fn set_grant(&self, grant: bool) {
            *self.grant.lock().unwrap() = grant;
        }
    }

    impl AudioFocus for SwitchFocus {
        fn request(&mut self) -> bool {
            *self.grant.lock().unwrap()
        }
        fn abandon(&mut self) {
            *self.abandons.lock().unwrap() += 1;
        }
    }

    struct Harness {
        machine: PlaybackStateMachine,
        engine: RecordingEngine,
        focus: SwitchFocus,
        _inbox: Inbox,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(PlaybackConfig::default())
        }

        fn with_config(config: PlaybackConfig) -> Self {
            let (inbox, sender) = Inbox::channel(DEFAULT_TICK_CAPACITY);
            let engine = RecordingEngine::default();
            let focus = SwitchFocus::granting();
            let timer = SleepTimer::new(sender, config.sleep_tick(), config.fade_window());
            let machine = PlaybackStateMachine::with_queue(
                config,
                PlaybackQueue::with_seed(1),
                Box::new(engine.clone()),
                Box::new(focus.clone()),
                timer,
            );
            Self {
                machine,
                engine,
                focus,
                _inbox: inbox,
            }
        }

        fn send(&mut self, command: Command) {
            self.machine.handle(command.into()).unwrap();
        }

        fn ready(&mut self) {
            let (generation, _) = self.engine.last_load().unwrap();
            self.machine
                .handle(SessionEvent::Engine(EngineEvent::Ready {
                    generation,
                    duration: Duration::ZERO,
                }))
                .unwrap();
        }

        fn engine_event(&mut self, make: impl FnOnce(u64) -> EngineEvent) {
            let (generation, _) = self.engine.last_load().unwrap();
            self.machine.handle(SessionEvent::Engine(make(generation))).unwrap();
        }

        fn focus(&mut self, state: AudioFocusState) {
            self.machine.handle(SessionEvent::Focus(state)).unwrap();
        }

        fn state(&self) -> TransportState {
            self.machine.transport().clone()
        }

        fn current(&self) -> Option<String> {
            self.machine
                .snapshot()
                .track_id()
                .map(ToString::to_string)
        }

        fn play_queue(&mut self, ids: &[(&str, u64)]) {
            let tracks = ids.iter().map(|(id, secs)| track(id, *secs)).collect();
            self.send(Command::PlayQueue {
                tracks,
                start_index: 0,
            });
            self.ready();
        }

        fn history(&mut self) -> Vec<(String, PlayOutcome)> {
            self.machine
                .drain_events()
                .into_iter()
                .filter_map(|e| match e {
                    PlaybackEvent::PlayRecorded(r) => Some((r.track_id.to_string(), r.outcome)),
                    _ => None,
                })
                .collect()
        }
    }

    fn track(id: &str, secs: u64) -> Track {
        Track::new(id, format!("Song {id}"), PathBuf::from(format!("/music/{id}.flac")))
            .with_duration(Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn play_queue_buffers_then_plays() {
        let mut h = Harness::new();
        h.send(Command::PlayQueue {
            tracks: vec![track("a", 180), track("b", 200)],
            start_index: 0,
        });
        assert_eq!(h.state(), TransportState::Buffering);
        assert_eq!(h.machine.focus_state(), AudioFocusState::Gained);

        h.ready();
        assert_eq!(h.state(), TransportState::Playing);
        assert!(h.engine.calls().contains(&Call::Play));
    }

    #[tokio::test]
    async fn focus_denied_enters_error_without_loading() {
        let mut h = Harness::new();
        h.focus.set_grant(false);
        h.send(Command::PlayTrack(track("a", 180)));

        assert_eq!(h.state(), TransportState::Error(ErrorReason::FocusDenied));
        assert!(h.engine.last_load().is_none());

        h.focus.set_grant(true);
        h.send(Command::Retry);
        assert_eq!(h.state(), TransportState::Buffering);
    }

    #[tokio::test]
    async fn stale_engine_callbacks_are_ignored() {
        let mut h = Harness::new();
        h.send(Command::PlayQueue {
            tracks: vec![track("a", 180), track("b", 200)],
            start_index: 0,
        });
        let (stale, _) = h.engine.last_load().unwrap();
        h.send(Command::SkipNext);

        h.machine
            .handle(SessionEvent::Engine(EngineEvent::Ready {
                generation: stale,
                duration: Duration::ZERO,
            }))
            .unwrap();
        assert_eq!(h.state(), TransportState::Buffering);
        assert_eq!(h.current().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn seek_clamps_and_keeps_state() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);

        h.send(Command::Seek(Duration::from_secs(500)));
        assert_eq!(h.machine.position(), Duration::from_secs(180));
        assert_eq!(h.state(), TransportState::Playing);

        h.send(Command::Pause);
        h.send(Command::Seek(Duration::from_secs(30)));
        assert_eq!(h.machine.position(), Duration::from_secs(30));
        assert_eq!(h.state(), TransportState::Paused);
        assert!(h.engine.calls().contains(&Call::Seek(Duration::from_secs(30))));
    }

    #[tokio::test]
    async fn seek_bumps_revision() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        let before = h.machine.snapshot().revision;
        h.send(Command::Seek(Duration::from_secs(10)));
        assert!(h.machine.snapshot().revision > before);
    }

    #[tokio::test]
    async fn position_ticks_do_not_bump_revision() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        let before = h.machine.snapshot().revision;
        h.engine_event(|generation| EngineEvent::Position {
            generation,
            position: Duration::from_secs(5),
        });
        assert_eq!(h.machine.snapshot().revision, before);
        assert_eq!(h.machine.snapshot().position, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn transient_focus_loss_pauses_and_resumes() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);

        h.focus(AudioFocusState::LostTransient);
        assert_eq!(h.state(), TransportState::Paused);

        h.focus(AudioFocusState::Gained);
        assert_eq!(h.state(), TransportState::Playing);
    }

    #[tokio::test]
    async fn user_pause_during_transient_loss_wins() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);

        h.focus(AudioFocusState::LostTransient);
        h.send(Command::Pause);
        h.focus(AudioFocusState::Gained);
        assert_eq!(h.state(), TransportState::Paused);
    }

    #[tokio::test]
    async fn permanent_focus_loss_stops_for_good() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);

        h.focus(AudioFocusState::LostPermanent);
        assert_eq!(h.state(), TransportState::Stopped);
        assert_eq!(h.machine.snapshot().stop_cause, Some(StopCause::FocusLost));

        h.focus(AudioFocusState::Gained);
        assert_eq!(h.state(), TransportState::Stopped);
    }

    #[tokio::test]
    async fn ducking_lowers_gain_without_pausing() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        let full = h.engine.gain();

        h.focus(AudioFocusState::LostTransientDuckable);
        assert_eq!(h.state(), TransportState::Playing);
        assert!(h.engine.gain() < full);

        h.focus(AudioFocusState::Gained);
        assert!((h.engine.gain() - full).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn pause_while_buffering_lands_paused() {
        let mut h = Harness::new();
        h.send(Command::PlayTrack(track("a", 180)));
        h.send(Command::Pause);
        assert_eq!(h.state(), TransportState::Buffering);

        h.ready();
        assert_eq!(h.state(), TransportState::Paused);
        assert!(!h.engine.calls().contains(&Call::Play));
    }

    #[tokio::test]
    async fn stop_releases_everything_and_keeps_queue() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180), ("b", 200)]);
        h.send(Command::SetSleepTimer {
            minutes: 10,
            fade_out: true,
        });

        h.send(Command::Stop);
        assert_eq!(h.state(), TransportState::Stopped);
        assert_eq!(h.machine.snapshot().stop_cause, Some(StopCause::User));
        assert!(!h.machine.snapshot().sleep_timer.active);
        assert_eq!(h.machine.focus_state(), AudioFocusState::None);
        assert_eq!(h.machine.queue().len(), 2);
        assert!(*h.focus.abandons.lock().unwrap() >= 1);
    }

    #[tokio::test]
    async fn removing_current_reloads_shifted_item() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180), ("b", 200), ("c", 160)]);
        h.send(Command::SkipTo(1));
        h.ready();
        assert_eq!(h.state(), TransportState::Playing);

        h.machine.drain_events();
        h.send(Command::RemoveFromQueue(1));
        assert_eq!(h.state(), TransportState::Buffering);
        assert_eq!(h.machine.queue().current_index(), Some(1));
        assert_eq!(h.current().as_deref(), Some("c"));
        assert_eq!(h.engine.last_load().unwrap().1, "c");
    }

    #[tokio::test]
    async fn removing_other_item_keeps_playing() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180), ("b", 200)]);
        h.send(Command::RemoveFromQueue(1));
        assert_eq!(h.state(), TransportState::Playing);
        assert_eq!(h.current().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn completion_advances_then_stops_at_end() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180), ("b", 200)]);

        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.state(), TransportState::Buffering);
        assert_eq!(h.current().as_deref(), Some("b"));
        h.ready();
        assert_eq!(h.state(), TransportState::Playing);

        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.state(), TransportState::Stopped);
        assert_eq!(h.machine.snapshot().stop_cause, Some(StopCause::QueueEnded));

        let history = h.history();
        assert_eq!(
            history,
            vec![
                ("a".to_string(), PlayOutcome::Completed),
                ("b".to_string(), PlayOutcome::Completed)
            ]
        );
    }

    #[tokio::test]
    async fn repeat_one_replays_on_completion_but_skip_advances() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180), ("b", 200)]);
        h.send(Command::SetRepeat(RepeatMode::One));

        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.state(), TransportState::Buffering);
        assert_eq!(h.current().as_deref(), Some("a"));

        h.ready();
        h.send(Command::SkipNext);
        assert_eq!(h.current().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn empty_track_under_repeat_one_stops_after_one_retry() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 0)]);
        h.send(Command::SetRepeat(RepeatMode::One));

        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.state(), TransportState::Buffering);
        h.ready();
        assert_eq!(h.state(), TransportState::Playing);

        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.state(), TransportState::Stopped);
        assert_eq!(h.machine.snapshot().stop_cause, Some(StopCause::QueueEnded));
        assert_eq!(
            h.history(),
            vec![
                ("a".to_string(), PlayOutcome::Partial),
                ("a".to_string(), PlayOutcome::Partial)
            ]
        );
    }

    #[tokio::test]
    async fn empty_track_moves_on_to_next_item() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 0), ("b", 200)]);
        h.send(Command::SetRepeat(RepeatMode::All));

        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.current().as_deref(), Some("b"));
        h.ready();

        // "b" plays for real, so "a" gets another pass on the next cycle
        h.engine_event(|generation| EngineEvent::Completed { generation });
        assert_eq!(h.current().as_deref(), Some("a"));
        assert_eq!(h.state(), TransportState::Buffering);
    }

    #[tokio::test]
    async fn seek_on_unknown_duration_is_not_clamped() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 0)]);

        h.send(Command::Seek(Duration::from_secs(75)));
        assert_eq!(h.machine.position(), Duration::from_secs(75));
        assert_eq!(h.state(), TransportState::Playing);
    }

    #[tokio::test]
    async fn user_stop_keeps_position_for_next_play() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        h.engine_event(|generation| EngineEvent::Position {
            generation,
            position: Duration::from_secs(60),
        });

        h.send(Command::Stop);
        assert_eq!(h.state(), TransportState::Stopped);
        assert_eq!(h.machine.position(), Duration::from_secs(60));
        assert_eq!(h.machine.snapshot().to_resume_record().position_ms, 60_000);

        h.send(Command::Play);
        assert!(h
            .engine
            .calls()
            .contains(&Call::Load(3, "a".to_string(), Duration::from_secs(60))));
    }

    #[tokio::test]
    async fn queue_end_rewinds_position() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        h.engine_event(|generation| EngineEvent::Completed { generation });

        assert_eq!(h.machine.snapshot().stop_cause, Some(StopCause::QueueEnded));
        assert_eq!(h.machine.position(), Duration::ZERO);
    }

    #[tokio::test]
    async fn decode_failure_skips_once_per_track() {
        let mut h = Harness::new();
        h.send(Command::PlayQueue {
            tracks: vec![track("a", 180), track("b", 200)],
            start_index: 0,
        });
        h.send(Command::SetRepeat(RepeatMode::All));

        h.engine_event(|generation| EngineEvent::Failed {
            generation,
            reason: "bad header".to_string(),
        });
        assert_eq!(h.state(), TransportState::Buffering);
        assert_eq!(h.current().as_deref(), Some("b"));

        h.engine_event(|generation| EngineEvent::Failed {
            generation,
            reason: "bad header".to_string(),
        });
        assert_eq!(h.current().as_deref(), Some("a"));

        // "a" already failed once: the queue is fully broken, stay in error
        h.engine_event(|generation| EngineEvent::Failed {
            generation,
            reason: "bad header".to_string(),
        });
        assert!(matches!(
            h.state(),
            TransportState::Error(ErrorReason::DecodeFailure { ref track_id, .. })
                if track_id.as_str() == "a"
        ));

        let errors = h
            .machine
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::Error { .. }))
            .count();
        assert_eq!(errors, 3);
    }

    #[tokio::test]
    async fn speed_rejected_in_error_state() {
        let mut h = Harness::new();
        h.focus.set_grant(false);
        h.send(Command::PlayTrack(track("a", 180)));
        let err = h
            .machine
            .handle(Command::SetPlaybackSpeed(1.5).into())
            .unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn speed_is_clamped_and_forwarded() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        h.send(Command::SetPlaybackSpeed(10.0));
        assert_eq!(h.machine.snapshot().speed, MAX_SPEED);
        assert!(h.engine.calls().contains(&Call::Speed(MAX_SPEED)));
    }

    #[tokio::test]
    async fn previous_restarts_after_three_seconds() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180), ("b", 200)]);
        h.send(Command::SkipNext);
        h.ready();
        h.engine_event(|generation| EngineEvent::Position {
            generation,
            position: Duration::from_secs(10),
        });

        h.send(Command::SkipPrevious);
        assert_eq!(h.current().as_deref(), Some("b"));
        assert_eq!(h.machine.position(), Duration::ZERO);
        assert_eq!(h.state(), TransportState::Playing);

        h.send(Command::SkipPrevious);
        assert_eq!(h.current().as_deref(), Some("a"));
        assert_eq!(h.state(), TransportState::Buffering);
    }

    #[tokio::test]
    async fn history_classifies_stop_and_skip() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 100), ("b", 100)]);
        h.engine_event(|generation| EngineEvent::Position {
            generation,
            position: Duration::from_secs(5),
        });
        h.send(Command::SkipNext);
        h.ready();
        h.engine_event(|generation| EngineEvent::Position {
            generation,
            position: Duration::from_secs(85),
        });
        h.send(Command::Stop);

        assert_eq!(
            h.history(),
            vec![
                ("a".to_string(), PlayOutcome::Skipped),
                ("b".to_string(), PlayOutcome::Completed)
            ]
        );
    }

    #[tokio::test]
    async fn accessory_disconnect_pauses_and_headphones_resume_when_configured() {
        let config = PlaybackConfig {
            resume_on_headphones: true,
            ..PlaybackConfig::default()
        };
        let mut h = Harness::with_config(config);
        h.play_queue(&[("a", 180)]);

        h.machine
            .handle(SessionEvent::System(SystemEvent::AccessoryDisconnected))
            .unwrap();
        assert_eq!(h.state(), TransportState::Paused);

        h.machine
            .handle(SessionEvent::System(SystemEvent::HeadphonesConnected))
            .unwrap();
        assert_eq!(h.state(), TransportState::Playing);
    }

    #[tokio::test]
    async fn headphones_do_not_resume_user_pause() {
        let config = PlaybackConfig {
            resume_on_headphones: true,
            ..PlaybackConfig::default()
        };
        let mut h = Harness::with_config(config);
        h.play_queue(&[("a", 180)]);
        h.send(Command::Pause);

        h.machine
            .handle(SessionEvent::System(SystemEvent::HeadphonesConnected))
            .unwrap();
        assert_eq!(h.state(), TransportState::Paused);
    }

    #[tokio::test]
    async fn remote_route_pauses_local_output() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        h.machine
            .handle(SessionEvent::System(SystemEvent::OutputRouteChanged {
                remote: true,
            }))
            .unwrap();
        assert_eq!(h.state(), TransportState::Paused);
    }

    #[tokio::test]
    async fn empty_queue_commands_are_noops() {
        let mut h = Harness::new();
        h.send(Command::Play);
        h.send(Command::SkipNext);
        h.send(Command::Seek(Duration::from_secs(3)));
        h.send(Command::PlayQueue {
            tracks: Vec::new(),
            start_index: 0,
        });
        assert_eq!(h.state(), TransportState::Idle);
    }

    #[tokio::test]
    async fn restore_populates_queue_without_playing() {
        let mut h = Harness::new();
        let record = ResumeRecord {
            track_id: Some(TrackId::from("b")),
            position_ms: 42_000,
            queue: vec!["a".into(), "gone".into(), "b".into()],
            queue_index: Some(2),
            repeat_mode: RepeatMode::All,
            shuffle: false,
        };
        h.machine
            .restore(vec![track("a", 180), track("b", 200)], &record)
            .unwrap();

        assert_eq!(h.state(), TransportState::Idle);
        assert_eq!(h.current().as_deref(), Some("b"));
        assert_eq!(h.machine.position(), Duration::from_secs(42));
        assert_eq!(h.machine.snapshot().repeat, RepeatMode::All);
        assert!(h.engine.last_load().is_none());

        h.send(Command::Play);
        assert_eq!(
            h.engine.last_load(),
            Some((1, "b".to_string()))
        );
        assert!(h
            .engine
            .calls()
            .contains(&Call::Load(1, "b".to_string(), Duration::from_secs(42))));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_timer_expiry_stops_once() {
        let mut h = Harness::new();
        h.play_queue(&[("a", 180)]);
        h.send(Command::SetSleepTimer {
            minutes: 1,
            fade_out: true,
        });
        let generation = h.machine.snapshot().sleep_timer.total;
        assert_eq!(generation, Duration::from_secs(60));

        // Stale expiry from an unknown run does nothing
        h.machine
            .handle(SessionEvent::SleepTimer(SleepTimerEvent::Expired { generation: 99 }))
            .unwrap();
        assert_eq!(h.state(), TransportState::Playing);

        h.machine
            .handle(SessionEvent::SleepTimer(SleepTimerEvent::Tick {
                generation: 1,
                remaining: Duration::from_secs(15),
                total: Duration::from_secs(60),
                fade: Some(0.5),
            }))
            .unwrap();
        assert!(h.machine.output_gain() < OutputGain::new(80, 0.2).gain());

        h.machine
            .handle(SessionEvent::SleepTimer(SleepTimerEvent::Expired { generation: 1 }))
            .unwrap();
        assert_eq!(h.state(), TransportState::Stopped);
        assert_eq!(h.machine.snapshot().stop_cause, Some(StopCause::SleepTimer));
        assert!((h.machine.output_gain() - OutputGain::new(80, 0.2).gain()).abs() < f32::EPSILON);

        h.send(Command::CancelSleepTimer);
        assert_eq!(h.state(), TransportState::Stopped);
    }
}
