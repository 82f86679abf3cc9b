//! Audio focus arbitration
//!
//! The single hardware output is shared between sessions through a focus
//! stack. The top of the stack holds focus; entries beneath it have lost
//! focus transiently and get it back when the holder above them abandons.
//!
//! The arbiter only reports focus changes. What a session does about them
//! (pause, duck, stop) is decided by the state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::AudioFocusState;

/// Kind of focus a client asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusGain {
    /// Long-lived exclusive use; the previous holder loses focus for good
    #[default]
    Exclusive,
    /// Short use; the previous holder pauses and gets focus back afterwards
    Transient,
    /// Short use that tolerates other audio at a lower level
    TransientMayDuck,
}

impl FocusGain {
    /// What the previous holder is told when this kind of request wins
    fn loss_for_previous(self) -> AudioFocusState {
        match self {
            Self::Exclusive => AudioFocusState::LostPermanent,
            Self::Transient => AudioFocusState::LostTransient,
            Self::TransientMayDuck => AudioFocusState::LostTransientDuckable,
        }
    }
}

/// Receiver of focus changes for one client
pub trait FocusListener: Send + Sync {
    /// Called with the new focus state; must not block
    fn on_focus_change(&self, state: AudioFocusState);
}

/// Focus as seen from a playback session
///
/// `request` is synchronous and bounded; it returns whether focus is now
/// held.
pub trait AudioFocus: Send {
    /// Request (or re-request) focus
    fn request(&mut self) -> bool;

    /// Release focus
    fn abandon(&mut self);
}

struct Client {
    id: Uuid,
    listener: Arc<dyn FocusListener>,
}

#[derive(Default)]
struct ArbiterState {
    clients: Vec<Client>,
    /// Focus stack, holder last
    stack: Vec<(Uuid, FocusGain)>,
    locked: bool,
}

impl ArbiterState {
    fn listener(&self, id: Uuid) -> Option<Arc<dyn FocusListener>> {
        self.clients
            .iter()
            .find(|c| c.id == id)
            .map(|c| Arc::clone(&c.listener))
    }
}

type Notification = (Arc<dyn FocusListener>, AudioFocusState);

/// In-process focus broker
///
/// Cheap to clone; all clones share one focus stack.
#[derive(Clone, Default)]
pub struct FocusArbiter {
    state: Arc<Mutex<ArbiterState>>,
}

impl FocusArbiter {
    /// Create an arbiter with an empty focus stack
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a client and get its handle
    pub fn register(&self, listener: Arc<dyn FocusListener>, gain: FocusGain) -> FocusHandle {
        let id = Uuid::new_v4();
        self.lock_state().clients.push(Client { id, listener });
        debug!(client = %id, "Registered focus client");
        FocusHandle {
            arbiter: self.clone(),
            id,
            gain,
        }
    }

    /// Block every request until `unlock` (e.g. during a phone call)
    pub fn lock(&self) {
        self.lock_state().locked = true;
        info!("Audio focus locked");
    }

    /// Allow requests again
    pub fn unlock(&self) {
        self.lock_state().locked = false;
        info!("Audio focus unlocked");
    }

    /// Whether requests are currently refused
    pub fn is_locked(&self) -> bool {
        self.lock_state().locked
    }

    /// Client currently holding focus
    pub fn holder(&self) -> Option<Uuid> {
        self.lock_state().stack.last().map(|(id, _)| *id)
    }

    /// Request focus for `client`
    pub fn request(&self, client: Uuid, gain: FocusGain) -> bool {
        let notifications = {
            let mut state = self.lock_state();
            if state.locked {
                debug!(client = %client, "Focus request refused: arbiter locked");
                return false;
            }

            if let Some(top) = state.stack.last_mut() {
                if top.0 == client {
                    top.1 = gain;
                    return true;
                }
            }

            state.stack.retain(|(id, _)| *id != client);

            let mut notifications: Vec<Notification> = Vec::new();
            let loss = gain.loss_for_previous();
            if loss == AudioFocusState::LostPermanent {
                // Nobody below an exclusive holder ever gets focus back
                for (id, _) in std::mem::take(&mut state.stack) {
                    if let Some(listener) = state.listener(id) {
                        notifications.push((listener, loss));
                    }
                }
            } else if let Some(&(previous, _)) = state.stack.last() {
                if let Some(listener) = state.listener(previous) {
                    notifications.push((listener, loss));
                }
            }

            state.stack.push((client, gain));
            notifications
        };

        debug!(client = %client, ?gain, "Focus granted");
        notify(notifications);
        true
    }

    /// Release focus held (or waited for) by `client`
    pub fn abandon(&self, client: Uuid) {
        let notifications = {
            let mut state = self.lock_state();
            let was_holder = state.stack.last().is_some_and(|(id, _)| *id == client);
            state.stack.retain(|(id, _)| *id != client);

            let mut notifications: Vec<Notification> = Vec::new();
            if was_holder {
                if let Some(&(next, _)) = state.stack.last() {
                    if let Some(listener) = state.listener(next) {
                        notifications.push((listener, AudioFocusState::Gained));
                    }
                }
            }
            notifications
        };

        notify(notifications);
    }

    fn unregister(&self, client: Uuid) {
        self.abandon(client);
        self.lock_state().clients.retain(|c| c.id != client);
    }
}

fn notify(notifications: Vec<Notification>) {
    for (listener, state) in notifications {
        listener.on_focus_change(state);
    }
}

/// A registered focus client
///
/// Dropping the handle abandons focus and unregisters the client.
pub struct FocusHandle {
    arbiter: FocusArbiter,
    id: Uuid,
    gain: FocusGain,
}

impl FocusHandle {
    /// Client identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request focus with an explicit gain kind
    pub fn request_with(&mut self, gain: FocusGain) -> bool {
        self.arbiter.request(self.id, gain)
    }

    /// Whether this client holds focus right now
    pub fn holds_focus(&self) -> bool {
        self.arbiter.holder() == Some(self.id)
    }
}

impl AudioFocus for FocusHandle {
    fn request(&mut self) -> bool {
        self.arbiter.request(self.id, self.gain)
    }

    fn abandon(&mut self) {
        self.arbiter.abandon(self.id);
    }
}

impl Drop for FocusHandle {
    fn drop(&mut self) {
        self.arbiter.unregister(self.id);
    }
}

impl std::fmt::Debug for FocusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusHandle")
            .field("id", &self.id)
            .field("gain", &self.gain)
            .finish()
    }
}
