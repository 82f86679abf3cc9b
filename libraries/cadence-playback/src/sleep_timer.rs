//! Sleep timer
//!
//! A countdown owned by the state machine. Each run spawns a ticker task
//! that reports into the session inbox and is cancelled through a
//! [`CancellationToken`]. Runs are numbered; the state machine only honours
//! events from the current run, so a tick or expiry that races a `stop` or
//! a restart is ignored and expiry takes effect at most once.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::inbox::EventSender;

/// Observable sleep timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SleepTimerState {
    /// Whether a countdown is running
    pub active: bool,
    /// Time left until expiry
    pub remaining: Duration,
    /// Length of the countdown including extensions
    pub total: Duration,
    /// Whether output fades out during the final phase
    pub fade_out: bool,
}

/// Event produced by a running countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SleepTimerEvent {
    /// Periodic progress report
    Tick {
        /// Run the tick belongs to
        generation: u64,
        /// Time left
        remaining: Duration,
        /// Countdown length
        total: Duration,
        /// Fade-out progress in [0, 1], present only inside the fade window
        fade: Option<f32>,
    },

    /// The countdown reached zero
    Expired {
        /// Run that expired
        generation: u64,
    },
}

impl SleepTimerEvent {
    /// Run this event belongs to
    pub fn generation(&self) -> u64 {
        match self {
            Self::Tick { generation, .. } | Self::Expired { generation } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Run {
    deadline: Instant,
    total: Duration,
    fade_out: bool,
}

/// Fade-out progress for `remaining` time left in a window of `window`
///
/// `None` outside the window (or with an empty window).
pub fn fade_progress(remaining: Duration, window: Duration) -> Option<f32> {
    if window.is_zero() || remaining > window {
        return None;
    }
    let fraction = remaining.as_secs_f64() / window.as_secs_f64();
    Some((1.0 - fraction).clamp(0.0, 1.0) as f32)
}

/// Cancellable countdown feeding the session inbox
#[derive(Debug)]
pub struct SleepTimer {
    sender: EventSender,
    tick: Duration,
    fade_window: Duration,
    generation: u64,
    run: Option<Run>,
    token: Option<CancellationToken>,
}

impl SleepTimer {
    /// Create an inactive timer
    pub fn new(sender: EventSender, tick: Duration, fade_window: Duration) -> Self {
        Self {
            sender,
            tick: tick.max(Duration::from_millis(1)),
            fade_window,
            generation: 0,
            run: None,
            token: None,
        }
    }

    /// Start a countdown of `minutes`, replacing any running one
    pub fn start(&mut self, minutes: u32, fade_out: bool) {
        self.start_for(Duration::from_secs(u64::from(minutes) * 60), fade_out);
    }

    /// Start a countdown of arbitrary length, replacing any running one
    pub fn start_for(&mut self, duration: Duration, fade_out: bool) {
        let run = Run {
            deadline: Instant::now() + duration,
            total: duration,
            fade_out,
        };
        info!(
            duration_secs = duration.as_secs(),
            fade_out, "Sleep timer started"
        );
        self.launch(run);
    }

    /// Stop the countdown and reset to inactive
    ///
    /// A no-op when nothing is running, including after expiry.
    pub fn stop(&mut self) {
        if self.run.take().is_some() {
            debug!(generation = self.generation, "Sleep timer stopped");
        }
        self.cancel_ticker();
    }

    /// Add `minutes` to a running countdown
    ///
    /// Returns whether the timer was active.
    pub fn extend(&mut self, minutes: u32) -> bool {
        self.extend_by(Duration::from_secs(u64::from(minutes) * 60))
    }

    /// Add `delta` to both remaining and total time of a running countdown
    pub fn extend_by(&mut self, delta: Duration) -> bool {
        let Some(run) = self.run else {
            return false;
        };
        let extended = Run {
            deadline: run.deadline + delta,
            total: run.total + delta,
            fade_out: run.fade_out,
        };
        debug!(delta_secs = delta.as_secs(), "Sleep timer extended");
        self.launch(extended);
        true
    }

    /// Whether `event` belongs to the running countdown
    pub fn accepts(&self, event: &SleepTimerEvent) -> bool {
        self.run.is_some() && event.generation() == self.generation
    }

    /// Consume an expiry event
    ///
    /// Returns true exactly once per run: for the first expiry of the
    /// running countdown. The timer is inactive afterwards.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.run.is_none() || generation != self.generation {
            return false;
        }
        self.run = None;
        self.token = None;
        info!("Sleep timer expired");
        true
    }

    /// Whether a countdown is running
    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current state; remaining time is computed from the deadline
    pub fn state(&self) -> SleepTimerState {
        match self.run {
            Some(run) => SleepTimerState {
                active: true,
                remaining: run.deadline.saturating_duration_since(Instant::now()),
                total: run.total,
                fade_out: run.fade_out,
            },
            None => SleepTimerState::default(),
        }
    }

    fn launch(&mut self, run: Run) {
        self.cancel_ticker();
        self.generation += 1;
        self.run = Some(run);

        let token = CancellationToken::new();
        self.token = Some(token.clone());
        tokio::spawn(tick_loop(
            self.sender.clone(),
            self.generation,
            run,
            self.tick,
            self.fade_window,
            token,
        ));
    }

    fn cancel_ticker(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

async fn tick_loop(
    sender: EventSender,
    generation: u64,
    run: Run,
    tick: Duration,
    fade_window: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let expiry = tokio::time::sleep_until(run.deadline);
    tokio::pin!(expiry);
    let mut last_fade = 0.0_f32;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            () = &mut expiry => {
                let _ = sender.sleep_timer(SleepTimerEvent::Expired { generation });
                return;
            }
            _ = interval.tick() => {}
        }

        let remaining = run.deadline.saturating_duration_since(Instant::now());
        let fade = if run.fade_out {
            fade_progress(remaining, fade_window).map(|p| {
                last_fade = last_fade.max(p);
                last_fade
            })
        } else {
            None
        };

        let event = SleepTimerEvent::Tick {
            generation,
            remaining,
            total: run.total,
            fade,
        };
        if sender.sleep_timer(event).is_err() {
            return;
        }
    }
}
