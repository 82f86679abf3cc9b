//! Unified session inbox
//!
//! All producers push into one ordered control channel. Position reports go
//! through a separate bounded channel that is only drained when no control
//! event is waiting, so a queued `stop` is always handled before any
//! position tick that arrived ahead of it. When the tick channel is full new
//! reports are dropped; the next one supersedes them anyway.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

use crate::engine::EngineEvent;
use crate::error::{PlaybackError, Result};
use crate::events::{Command, SessionEvent, SystemEvent};
use crate::focus::FocusListener;
use crate::sleep_timer::SleepTimerEvent;
use crate::types::AudioFocusState;

/// Default capacity of the position tick channel
pub const DEFAULT_TICK_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy)]
struct PositionTick {
    generation: u64,
    position: Duration,
}

/// Receiving side, owned by the session loop
#[derive(Debug)]
pub struct Inbox {
    control: mpsc::UnboundedReceiver<SessionEvent>,
    ticks: mpsc::Receiver<PositionTick>,
}

/// Producer side; cheap to clone
#[derive(Debug, Clone)]
pub struct EventSender {
    control: mpsc::UnboundedSender<SessionEvent>,
    ticks: mpsc::Sender<PositionTick>,
}

impl Inbox {
    /// Create an inbox and its sender
    pub fn channel(tick_capacity: usize) -> (Self, EventSender) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::channel(tick_capacity.max(1));
        (
            Self {
                control: control_rx,
                ticks: tick_rx,
            },
            EventSender {
                control: control_tx,
                ticks: tick_tx,
            },
        )
    }

    /// Wait for the next event, control events first
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            biased;
            event = self.control.recv() => event,
            Some(tick) = self.ticks.recv() => Some(tick.into()),
        }
    }

    /// Take the next event without waiting, control events first
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        if let Ok(event) = self.control.try_recv() {
            return Some(event);
        }
        self.ticks.try_recv().ok().map(Into::into)
    }
}

impl From<PositionTick> for SessionEvent {
    fn from(tick: PositionTick) -> Self {
        SessionEvent::Engine(EngineEvent::Position {
            generation: tick.generation,
            position: tick.position,
        })
    }
}

impl EventSender {
    /// Push an event
    pub fn send(&self, event: SessionEvent) -> Result<()> {
        if let SessionEvent::Engine(EngineEvent::Position {
            generation,
            position,
        }) = event
        {
            self.position(generation, position);
            return Ok(());
        }
        self.control
            .send(event)
            .map_err(|_| PlaybackError::SessionClosed)
    }

    /// Push a command
    pub fn command(&self, command: Command) -> Result<()> {
        self.send(SessionEvent::Command(command))
    }

    /// Push a decode engine callback
    pub fn engine(&self, event: EngineEvent) -> Result<()> {
        self.send(SessionEvent::Engine(event))
    }

    /// Push a sleep timer event
    pub fn sleep_timer(&self, event: SleepTimerEvent) -> Result<()> {
        self.send(SessionEvent::SleepTimer(event))
    }

    /// Push a host signal
    pub fn system(&self, event: SystemEvent) -> Result<()> {
        self.send(SessionEvent::System(event))
    }

    /// Push a position report on the low-priority channel
    pub fn position(&self, generation: u64, position: Duration) {
        if self
            .ticks
            .try_send(PositionTick {
                generation,
                position,
            })
            .is_err()
        {
            trace!(generation, "Position tick dropped");
        }
    }

    /// Whether the session loop has gone away
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

impl FocusListener for EventSender {
    fn on_focus_change(&self, state: AudioFocusState) {
        // A closed inbox means the session is gone; nothing left to tell
        let _ = self.send(SessionEvent::Focus(state));
    }
}
