//! Session projector
//!
//! Renders snapshots into the three outward projections: media-session
//! metadata and controls, the persistent notification, and the persisted
//! resume record. The renderers are pure functions of a snapshot; the
//! [`SessionProjector`] worker feeds them from the snapshot channel on its
//! own task so the command loop never waits on a sink or on storage.

use cadence_core::{RepeatMode, ResumeStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::events::MediaAction;
use crate::snapshot::PlaybackSnapshot;
use crate::types::{StopCause, TransportState};

/// Transport controls currently actionable
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
    pub skip_next: bool,
    pub skip_previous: bool,
    pub seek: bool,
}

impl Capabilities {
    /// Media actions backed by these capabilities
    pub fn actions(&self) -> Vec<MediaAction> {
        let mut actions = Vec::with_capacity(4);
        if self.skip_previous {
            actions.push(MediaAction::SkipPrevious);
        }
        if self.play || self.pause {
            actions.push(MediaAction::PlayPause);
        }
        if self.skip_next {
            actions.push(MediaAction::SkipNext);
        }
        if self.stop {
            actions.push(MediaAction::Stop);
        }
        actions
    }
}

/// Metadata published on the media session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Duration,
    pub track_number: Option<u32>,
    /// One-based position in the queue and queue length
    pub queue_position: Option<(usize, usize)>,
}

/// Complete media-session state
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSessionState {
    pub metadata: Option<SessionMetadata>,
    pub capabilities: Capabilities,
    pub transport: TransportState,
    pub position: Duration,
    pub speed: f32,
}

/// Icon shown on the notification's main button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportIcon {
    Play,
    Pause,
    Buffering,
    Error,
}

/// Persistent notification content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub icon: TransportIcon,
    pub position: Duration,
    pub duration: Duration,
    /// Not dismissible by the user while audio is active
    pub ongoing: bool,
    pub actions: Vec<MediaAction>,
}

/// What to do with the notification for a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationUpdate {
    /// Post or replace the notification
    Show(Notification),
    /// Remove it; only after an explicit stop
    Dismiss,
    /// Leave whatever is posted alone
    Keep,
}

fn has_next(snapshot: &PlaybackSnapshot) -> bool {
    let Some(index) = snapshot.queue_index else {
        return false;
    };
    index + 1 < snapshot.queue.len() || snapshot.repeat != RepeatMode::Off
}

/// Controls that make sense for a snapshot
pub fn capabilities(snapshot: &PlaybackSnapshot) -> Capabilities {
    let has_track = snapshot.track.is_some();
    let skip_next = has_next(snapshot);
    let skip_previous = has_track;

    match snapshot.transport {
        TransportState::Idle | TransportState::Stopped => Capabilities {
            play: has_track,
            skip_next,
            skip_previous,
            ..Capabilities::default()
        },
        TransportState::Buffering => Capabilities {
            pause: true,
            stop: true,
            skip_next,
            skip_previous,
            ..Capabilities::default()
        },
        TransportState::Playing => Capabilities {
            pause: true,
            stop: true,
            skip_next,
            skip_previous,
            seek: true,
            ..Capabilities::default()
        },
        TransportState::Paused => Capabilities {
            play: true,
            stop: true,
            skip_next,
            skip_previous,
            seek: true,
            ..Capabilities::default()
        },
        TransportState::Error(_) => Capabilities {
            play: has_track,
            skip_next,
            ..Capabilities::default()
        },
    }
}

/// Media-session metadata and controls for a snapshot
pub fn render_media_session(snapshot: &PlaybackSnapshot) -> MediaSessionState {
    let metadata = snapshot.track.as_ref().map(|track| SessionMetadata {
        title: track.title.clone(),
        artist: track.artist.clone(),
        album: track.album.clone(),
        duration: snapshot.duration,
        track_number: track.track_number,
        queue_position: snapshot
            .queue_index
            .map(|index| (index + 1, snapshot.queue.len())),
    });

    MediaSessionState {
        metadata,
        capabilities: capabilities(snapshot),
        transport: snapshot.transport.clone(),
        position: snapshot.position,
        speed: snapshot.speed,
    }
}

/// Notification for a snapshot
///
/// The notification is only ever removed after an explicit user stop; a
/// pause keeps it (and with it the lock-screen controls).
pub fn render_notification(snapshot: &PlaybackSnapshot) -> NotificationUpdate {
    if snapshot.transport == TransportState::Stopped && snapshot.stop_cause == Some(StopCause::User)
    {
        return NotificationUpdate::Dismiss;
    }
    let Some(track) = snapshot.track.as_ref() else {
        return NotificationUpdate::Keep;
    };
    if snapshot.transport == TransportState::Idle {
        return NotificationUpdate::Keep;
    }

    let icon = match snapshot.transport {
        TransportState::Playing => TransportIcon::Pause,
        TransportState::Buffering => TransportIcon::Buffering,
        TransportState::Error(_) => TransportIcon::Error,
        _ => TransportIcon::Play,
    };
    let text = match (&track.artist, &track.album) {
        (Some(artist), Some(album)) => format!("{artist} - {album}"),
        (Some(artist), None) => artist.clone(),
        (None, Some(album)) => album.clone(),
        (None, None) => String::new(),
    };

    NotificationUpdate::Show(Notification {
        title: track.title.clone(),
        text,
        icon,
        position: snapshot.position,
        duration: snapshot.duration,
        ongoing: snapshot.transport.is_active(),
        actions: capabilities(snapshot).actions(),
    })
}

/// Media-session surface
pub trait MediaSessionSink: Send {
    fn update(&mut self, state: &MediaSessionState);
}

/// Notification surface
pub trait NotificationSink: Send {
    fn show(&mut self, notification: &Notification);
    fn dismiss(&mut self);
}

/// Projection worker
pub struct SessionProjector {
    media: Option<Box<dyn MediaSessionSink>>,
    notification: Option<Box<dyn NotificationSink>>,
    store: Arc<dyn ResumeStore>,

    last_media: Option<MediaSessionState>,
    last_notification: Option<Notification>,
    last_persisted: Option<u64>,
}

impl SessionProjector {
    /// Create a projector persisting through `store`
    pub fn new(store: Arc<dyn ResumeStore>) -> Self {
        Self {
            media: None,
            notification: None,
            store,
            last_media: None,
            last_notification: None,
            last_persisted: None,
        }
    }

    /// Attach a media-session sink
    #[must_use]
    pub fn with_media_session(mut self, sink: Box<dyn MediaSessionSink>) -> Self {
        self.media = Some(sink);
        self
    }

    /// Attach a notification sink
    #[must_use]
    pub fn with_notification(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification = Some(sink);
        self
    }

    /// Render one snapshot into every projection
    pub async fn project(&mut self, snapshot: &PlaybackSnapshot) {
        self.update_media_session(snapshot);
        self.update_notification(snapshot);
        self.persist(snapshot).await;
    }

    /// Follow the snapshot channel until the session closes it
    pub async fn run(mut self, mut snapshots: watch::Receiver<PlaybackSnapshot>) {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            self.project(&snapshot).await;
            if snapshots.changed().await.is_err() {
                break;
            }
        }
        debug!("Session projector stopped");
    }

    fn update_media_session(&mut self, snapshot: &PlaybackSnapshot) {
        let Some(sink) = self.media.as_mut() else {
            return;
        };
        let state = render_media_session(snapshot);
        if self.last_media.as_ref() == Some(&state) {
            return;
        }
        sink.update(&state);
        self.last_media = Some(state);
    }

    fn update_notification(&mut self, snapshot: &PlaybackSnapshot) {
        let Some(sink) = self.notification.as_mut() else {
            return;
        };
        match render_notification(snapshot) {
            NotificationUpdate::Show(notification) => {
                if self.last_notification.as_ref() != Some(&notification) {
                    sink.show(&notification);
                    self.last_notification = Some(notification);
                }
            }
            NotificationUpdate::Dismiss => {
                if self.last_notification.take().is_some() {
                    sink.dismiss();
                }
            }
            NotificationUpdate::Keep => {}
        }
    }

    /// Write the resume record once per revision
    async fn persist(&mut self, snapshot: &PlaybackSnapshot) {
        if snapshot.revision == 0 || self.last_persisted == Some(snapshot.revision) {
            return;
        }
        self.last_persisted = Some(snapshot.revision);

        let record = snapshot.to_resume_record();
        match self.store.save(&record).await {
            Ok(()) => trace!(revision = snapshot.revision, "Resume record saved"),
            Err(e) => warn!(error = %e, "Failed to persist resume record"),
        }
    }
}
