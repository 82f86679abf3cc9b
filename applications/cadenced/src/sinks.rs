//! Log-backed projection sinks
//!
//! A headless daemon has no media-session or notification surface, so these
//! sinks report what would be published through tracing instead.

use cadence_playback::{
    HostService, MediaSessionSink, MediaSessionState, Notification, NotificationSink,
};
use tracing::{debug, info};

/// Media session that logs metadata and capability changes
#[derive(Debug, Default)]
pub struct LogMediaSession {
    last: Option<MediaSessionState>,
    updates: usize,
}

impl LogMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct states published
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl MediaSessionSink for LogMediaSession {
    fn update(&mut self, state: &MediaSessionState) {
        let changed_track = self.last.as_ref().map(|last| &last.metadata) != Some(&state.metadata);
        let changed_controls = self.last.as_ref().map_or(true, |last| {
            last.capabilities != state.capabilities || last.transport != state.transport
        });

        if changed_track {
            match &state.metadata {
                Some(metadata) => info!(
                    title = %metadata.title,
                    artist = metadata.artist.as_deref().unwrap_or("-"),
                    duration_ms = metadata.duration.as_millis() as u64,
                    queue_position = ?metadata.queue_position,
                    "Media session metadata"
                ),
                None => info!("Media session cleared"),
            }
        }
        if changed_controls {
            debug!(
                transport = %state.transport,
                actions = ?state.capabilities.actions(),
                "Media session controls"
            );
        }

        if changed_track || changed_controls {
            self.updates += 1;
        }
        self.last = Some(state.clone());
    }
}

/// Notification surface that logs posts and removals
#[derive(Debug, Default)]
pub struct LogNotification {
    posted: bool,
}

impl LogNotification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a notification is currently posted
    pub fn is_posted(&self) -> bool {
        self.posted
    }
}

impl NotificationSink for LogNotification {
    fn show(&mut self, notification: &Notification) {
        if !self.posted {
            info!(title = %notification.title, "Notification posted");
        }
        self.posted = true;
        debug!(
            title = %notification.title,
            text = %notification.text,
            icon = ?notification.icon,
            ongoing = notification.ongoing,
            "Notification updated"
        );
    }

    fn dismiss(&mut self) {
        if self.posted {
            info!("Notification dismissed");
        }
        self.posted = false;
    }
}

/// Host service that logs foreground promotions and demotions
#[derive(Debug, Default)]
pub struct LogHostService;

impl HostService for LogHostService {
    fn promote(&mut self) {
        info!("Host promoted to foreground");
    }

    fn demote(&mut self) {
        info!("Host demoted to background");
    }
}
