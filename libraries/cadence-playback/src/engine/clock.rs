//! Clock-driven reference engine
//!
//! Produces no audio. It checks that the track file exists, reports the
//! track's catalogued duration, and advances position on the tokio clock at
//! the configured speed. Useful for headless runs and for exercising the
//! session end to end under paused test time.

use cadence_core::Track;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{DecodeEngine, EngineEvent};
use crate::inbox::EventSender;

#[derive(Debug, Clone, Copy)]
struct Loaded {
    generation: u64,
    duration: Duration,
}

/// Reference [`DecodeEngine`] that keeps time without decoding
#[derive(Debug)]
pub struct ClockEngine {
    sender: EventSender,
    interval: Duration,
    check_files: bool,

    loaded: Option<Loaded>,
    /// Position at `anchor`
    base: Duration,
    /// Set while playing
    anchor: Option<Instant>,
    speed: f32,
    gain: f32,

    load_token: Option<CancellationToken>,
    ticker: Option<CancellationToken>,
}

impl ClockEngine {
    /// Create an engine reporting position every `interval`
    pub fn new(sender: EventSender, interval: Duration) -> Self {
        Self {
            sender,
            interval: interval.max(Duration::from_millis(1)),
            check_files: true,
            loaded: None,
            base: Duration::ZERO,
            anchor: None,
            speed: 1.0,
            gain: 1.0,
            load_token: None,
            ticker: None,
        }
    }

    /// Skip the file existence check (for catalogue-only tracks)
    #[must_use]
    pub fn without_file_check(mut self) -> Self {
        self.check_files = false;
        self
    }

    /// Last gain set by the session
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Current position
    pub fn position(&self) -> Duration {
        match self.anchor {
            Some(anchor) => self.base + anchor.elapsed().mul_f32(self.speed),
            None => self.base,
        }
    }

    fn rebase(&mut self) {
        self.base = self.position();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }

    fn cancel_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }

    fn start_ticker(&mut self) {
        self.cancel_ticker();
        let (Some(loaded), Some(anchor)) = (self.loaded, self.anchor) else {
            return;
        };

        let token = CancellationToken::new();
        self.ticker = Some(token.clone());
        tokio::spawn(run_clock(
            self.sender.clone(),
            loaded,
            self.base,
            anchor,
            self.speed,
            self.interval,
            token,
        ));
    }
}

impl DecodeEngine for ClockEngine {
    fn load(&mut self, generation: u64, track: &Track, start: Duration) {
        self.stop();

        let duration = track.duration;
        self.loaded = Some(Loaded {
            generation,
            duration,
        });
        self.base = start.min(duration);

        let token = CancellationToken::new();
        self.load_token = Some(token.clone());
        let sender = self.sender.clone();
        let path = track.path.clone();
        let check_files = self.check_files;
        debug!(generation, track_id = %track.id, "Loading track");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => return,
                outcome = open(path, check_files) => outcome,
            };
            let event = match outcome {
                Ok(()) => EngineEvent::Ready {
                    generation,
                    duration,
                },
                Err(reason) => EngineEvent::Failed { generation, reason },
            };
            let _ = sender.engine(event);
        });
    }

    fn play(&mut self) {
        if self.loaded.is_none() || self.anchor.is_some() {
            return;
        }
        self.anchor = Some(Instant::now());
        self.start_ticker();
    }

    fn pause(&mut self) {
        if self.anchor.is_none() {
            return;
        }
        self.rebase();
        self.anchor = None;
        self.cancel_ticker();
    }

    fn stop(&mut self) {
        if let Some(token) = self.load_token.take() {
            token.cancel();
        }
        self.cancel_ticker();
        self.loaded = None;
        self.anchor = None;
        self.base = Duration::ZERO;
    }

    fn seek(&mut self, position: Duration) {
        let Some(loaded) = self.loaded else {
            return;
        };
        self.base = position.min(loaded.duration);
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
            self.start_ticker();
        }
    }

    fn set_gain(&mut self, gain: f32) {
        trace!(gain, "Output gain");
        self.gain = gain;
    }

    fn set_speed(&mut self, speed: f32) {
        self.rebase();
        self.speed = speed;
        if self.anchor.is_some() {
            self.start_ticker();
        }
    }
}

impl Drop for ClockEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn open(path: PathBuf, check_files: bool) -> Result<(), String> {
    if !check_files {
        return Ok(());
    }
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(format!("{} is not a file", path.display())),
        Err(e) => Err(format!("{}: {e}", path.display())),
    }
}

async fn run_clock(
    sender: EventSender,
    loaded: Loaded,
    base: Duration,
    anchor: Instant,
    speed: f32,
    interval: Duration,
    token: CancellationToken,
) {
    let remaining = loaded.duration.saturating_sub(base);
    let end = anchor + remaining.div_f32(speed.max(f32::EPSILON));
    let finished = tokio::time::sleep_until(end);
    tokio::pin!(finished);

    let mut ticks = tokio::time::interval_at(anchor + interval, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            () = &mut finished => {
                sender.position(loaded.generation, loaded.duration);
                let _ = sender.engine(EngineEvent::Completed {
                    generation: loaded.generation,
                });
                return;
            }
            _ = ticks.tick() => {
                let position = (base + anchor.elapsed().mul_f32(speed)).min(loaded.duration);
                sender.position(loaded.generation, position);
            }
        }
    }
}
