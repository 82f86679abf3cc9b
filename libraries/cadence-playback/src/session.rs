//! Playback session runtime
//!
//! Wires the pieces together: one task owns the [`PlaybackStateMachine`] and
//! consumes the inbox, publishing a snapshot after every event. The
//! projector, the host lifecycle and the play-history writer each run on
//! their own task and never hold up the command loop.

use cadence_core::{Library, PlayRecord, ResumeStore, Track};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{ClockEngine, DecodeEngine};
use crate::error::{PlaybackError, Result};
use crate::events::{Command, MediaAction, PlaybackEvent, SessionEvent, SystemEvent};
use crate::focus::{AudioFocus, FocusArbiter, FocusGain};
use crate::host::{run_host, HostLifecycle, HostService};
use crate::inbox::{EventSender, Inbox, DEFAULT_TICK_CAPACITY};
use crate::machine::PlaybackStateMachine;
use crate::projector::{MediaSessionSink, NotificationSink, SessionProjector};
use crate::queue::PlaybackQueue;
use crate::sleep_timer::SleepTimer;
use crate::snapshot::PlaybackSnapshot;
use crate::types::PlaybackConfig;

/// Capacity of the playback event broadcast
const EVENT_CAPACITY: usize = 64;

/// Configures and starts a playback session
pub struct SessionBuilder {
    config: PlaybackConfig,
    library: Arc<dyn Library>,
    store: Arc<dyn ResumeStore>,
    inbox: Inbox,
    sender: EventSender,
    engine: Option<Box<dyn DecodeEngine>>,
    focus: Option<Box<dyn AudioFocus>>,
    media_session: Option<Box<dyn MediaSessionSink>>,
    notification: Option<Box<dyn NotificationSink>>,
    host_service: Option<Box<dyn HostService>>,
    seed: Option<u64>,
}

impl SessionBuilder {
    /// Start configuring a session
    pub fn new(
        config: PlaybackConfig,
        library: Arc<dyn Library>,
        store: Arc<dyn ResumeStore>,
    ) -> Self {
        let (inbox, sender) = Inbox::channel(DEFAULT_TICK_CAPACITY);
        Self {
            config,
            library,
            store,
            inbox,
            sender,
            engine: None,
            focus: None,
            media_session: None,
            notification: None,
            host_service: None,
            seed: None,
        }
    }

    /// Sender feeding this session's inbox
    ///
    /// Engines and other producers are built around a clone of it.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Use a specific decode engine (default: [`ClockEngine`])
    #[must_use]
    pub fn engine(mut self, engine: Box<dyn DecodeEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Use a specific focus backend
    #[must_use]
    pub fn focus(mut self, focus: Box<dyn AudioFocus>) -> Self {
        self.focus = Some(focus);
        self
    }

    /// Register with a shared arbiter as an exclusive client
    #[must_use]
    pub fn focus_arbiter(self, arbiter: &FocusArbiter) -> Self {
        let handle = arbiter.register(Arc::new(self.sender.clone()), FocusGain::Exclusive);
        self.focus(Box::new(handle))
    }

    /// Publish media-session state to `sink`
    #[must_use]
    pub fn media_session(mut self, sink: Box<dyn MediaSessionSink>) -> Self {
        self.media_session = Some(sink);
        self
    }

    /// Publish the notification to `sink`
    #[must_use]
    pub fn notification(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification = Some(sink);
        self
    }

    /// Drive foreground promotion through `service`
    #[must_use]
    pub fn host_service(mut self, service: Box<dyn HostService>) -> Self {
        self.host_service = Some(service);
        self
    }

    /// Fix the shuffle seed
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Restore the resume record and spawn the session tasks
    ///
    /// Must be called inside a tokio runtime. Never starts playback.
    pub async fn start(self) -> Result<SessionHandle> {
        let Self {
            config,
            library,
            store,
            inbox,
            sender,
            engine,
            focus,
            media_session,
            notification,
            host_service,
            seed,
        } = self;

        let engine = engine.unwrap_or_else(|| {
            Box::new(ClockEngine::new(sender.clone(), config.position_interval()))
        });
        let focus = focus.unwrap_or_else(|| {
            let arbiter = FocusArbiter::new();
            Box::new(arbiter.register(Arc::new(sender.clone()), FocusGain::Exclusive))
        });
        let timer = SleepTimer::new(sender.clone(), config.sleep_tick(), config.fade_window());

        let mut queue = PlaybackQueue::with_seed(seed.unwrap_or_else(|| rand::thread_rng().next_u64()));
        queue.set_repeat_mode(config.repeat);
        queue.set_shuffle(config.shuffle);
        let host_grace = config.host_grace();
        let mut machine = PlaybackStateMachine::with_queue(config, queue, engine, focus, timer);

        restore(&mut machine, library.as_ref(), store.as_ref()).await;

        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot().clone());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (history_tx, history_rx) = mpsc::unbounded_channel();

        let mut projector = SessionProjector::new(store);
        if let Some(sink) = media_session {
            projector = projector.with_media_session(sink);
        }
        if let Some(sink) = notification {
            projector = projector.with_notification(sink);
        }

        let mut workers = vec![
            tokio::spawn(projector.run(snapshot_tx.subscribe())),
            tokio::spawn(write_history(Arc::clone(&library), history_rx)),
        ];
        if let Some(service) = host_service {
            workers.push(tokio::spawn(run_host(
                HostLifecycle::new(host_grace),
                service,
                snapshot_tx.subscribe(),
            )));
        }

        let session = tokio::spawn(run_session(
            machine,
            inbox,
            snapshot_tx,
            events_tx.clone(),
            history_tx,
        ));
        info!("Playback session started");

        Ok(SessionHandle {
            sender,
            snapshots: snapshot_rx,
            events: events_tx,
            session: Some(session),
            workers,
        })
    }
}

/// Pre-populate the queue from the stored resume record
async fn restore(
    machine: &mut PlaybackStateMachine,
    library: &dyn Library,
    store: &dyn ResumeStore,
) {
    let record = match store.load().await {
        Ok(Some(record)) if !record.is_empty() => record,
        Ok(_) => return,
        Err(e) => {
            warn!(error = %e, "Failed to read resume record");
            return;
        }
    };

    let mut tracks: Vec<Track> = Vec::with_capacity(record.queue.len());
    for id in &record.queue {
        match library.track_by_id(id).await {
            Ok(Some(track)) => tracks.push(track),
            Ok(None) => debug!(track_id = %id, "Dropping unresolved queue entry"),
            Err(e) => warn!(track_id = %id, error = %e, "Track lookup failed"),
        }
    }

    let resolved = tracks.len();
    match machine.restore(tracks, &record) {
        Ok(()) => info!(tracks = resolved, "Restored resume record"),
        Err(e) => warn!(error = %e, "Failed to restore resume record"),
    }
}

async fn run_session(
    mut machine: PlaybackStateMachine,
    mut inbox: Inbox,
    snapshots: watch::Sender<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    history: mpsc::UnboundedSender<PlayRecord>,
) {
    while let Some(event) = inbox.recv().await {
        let shutdown = matches!(event, SessionEvent::Shutdown);
        if let Err(e) = machine.handle(event) {
            warn!(error = %e, "Event rejected");
        }

        for event in machine.drain_events() {
            if let PlaybackEvent::PlayRecorded(record) = &event {
                if history.send(record.clone()).is_err() {
                    warn!("History writer is gone; dropping play record");
                }
            }
            // No subscribers is fine
            let _ = events.send(event);
        }

        let snapshot = machine.snapshot();
        if *snapshots.borrow() != *snapshot {
            snapshots.send_replace(snapshot.clone());
        }

        if shutdown {
            break;
        }
    }
    info!("Playback session stopped");
}

/// Write play history in order, off the command loop
async fn write_history(library: Arc<dyn Library>, mut records: mpsc::UnboundedReceiver<PlayRecord>) {
    while let Some(record) = records.recv().await {
        debug!(
            track_id = %record.track_id,
            outcome = record.outcome.as_str(),
            "Recording play"
        );
        if let Err(e) = library.record_play(&record).await {
            warn!(track_id = %record.track_id, error = %e, "Failed to record play");
            continue;
        }
        if record.outcome.counts_as_play() {
            if let Err(e) = library.increment_play_count(&record.track_id).await {
                warn!(track_id = %record.track_id, error = %e, "Failed to update play count");
            }
        }
    }
}

/// Handle to a running session
///
/// Cheap operations only: every command is queued and handled by the
/// session task in order.
pub struct SessionHandle {
    sender: EventSender,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    session: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    /// Queue a command
    pub fn command(&self, command: Command) -> Result<()> {
        self.sender.command(command)
    }

    /// Queue a media-session action
    pub fn media_action(&self, action: MediaAction) -> Result<()> {
        self.command(action.into())
    }

    /// Queue a host signal
    pub fn system(&self, event: SystemEvent) -> Result<()> {
        self.sender.system(event)
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Snapshot stream
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    /// Playback event stream
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Sender feeding the session inbox
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Wait until a snapshot satisfies `predicate`, up to `timeout`
    pub async fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> Option<PlaybackSnapshot>
    where
        F: FnMut(&PlaybackSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let waited = tokio::time::timeout(timeout, snapshots.wait_for(|s| predicate(s))).await;
        match waited {
            Ok(Ok(snapshot)) => Some(snapshot.clone()),
            _ => None,
        }
    }

    /// Stop playback and wait for every session task to finish
    pub async fn shutdown(mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.sender.send(SessionEvent::Shutdown)?;
        session.await.map_err(|e| {
            PlaybackError::InvalidOperation(format!("session task failed: {e}"))
        })?;

        for worker in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.await {
                warn!(error = %e, "Session worker failed");
            }
        }
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.sender.send(SessionEvent::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransportState;
    use cadence_core::{
        InMemoryLibrary, InMemoryResumeStore, PlayOutcome, RepeatMode, ResumeRecord, TrackId,
    };
    use std::path::PathBuf;

    fn track(id: &str, secs: u64) -> Track {
        Track::new(id, format!("Song {id}"), PathBuf::from(format!("/music/{id}.flac")))
            .with_duration(Duration::from_secs(secs))
    }

    async fn start(
        library: Arc<InMemoryLibrary>,
        store: Arc<InMemoryResumeStore>,
    ) -> SessionHandle {
        let builder = SessionBuilder::new(PlaybackConfig::default(), library, store).seed(7);
        let engine = ClockEngine::new(builder.sender(), Duration::from_millis(500)).without_file_check();
        builder.engine(Box::new(engine)).start().await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn play_queue_reaches_playing() {
        let library = Arc::new(InMemoryLibrary::new());
        let store = Arc::new(InMemoryResumeStore::new());
        let session = start(library, store).await;

        session
            .command(Command::PlayQueue {
                tracks: vec![track("a", 180), track("b", 200)],
                start_index: 0,
            })
            .unwrap();

        let snapshot = session
            .wait_for(Duration::from_secs(5), |s| s.transport == TransportState::Playing)
            .await
            .unwrap();
        assert_eq!(snapshot.track_id(), Some(&TrackId::from("a")));

        session.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restore_drops_unknown_ids_and_stays_idle() {
        let library = Arc::new(InMemoryLibrary::with_tracks([track("a", 180), track("c", 120)]));
        let store = Arc::new(InMemoryResumeStore::with_record(ResumeRecord {
            track_id: Some(TrackId::from("c")),
            position_ms: 42_000,
            queue: vec![TrackId::from("a"), TrackId::from("gone"), TrackId::from("c")],
            queue_index: Some(2),
            repeat_mode: RepeatMode::All,
            shuffle: false,
        }));
        let session = start(library, store).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.transport, TransportState::Idle);
        assert_eq!(snapshot.queue.len(), 2);
        assert_eq!(snapshot.queue_index, Some(1));
        assert_eq!(snapshot.position, Duration::from_secs(42));
        assert_eq!(snapshot.repeat, RepeatMode::All);

        session.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_past_threshold_writes_completed_history() {
        let library = Arc::new(InMemoryLibrary::new());
        let store = Arc::new(InMemoryResumeStore::new());
        let session = start(Arc::clone(&library), store).await;

        session.command(Command::PlayTrack(track("a", 100))).unwrap();
        session
            .wait_for(Duration::from_secs(5), |s| s.transport == TransportState::Playing)
            .await
            .unwrap();
        session.command(Command::Seek(Duration::from_secs(85))).unwrap();
        session.command(Command::Stop).unwrap();
        session
            .wait_for(Duration::from_secs(5), |s| s.transport == TransportState::Stopped)
            .await
            .unwrap();
        session.shutdown().await.unwrap();

        let history = library.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, PlayOutcome::Completed);
        assert_eq!(library.play_count(&TrackId::from("a")).await, 1);
    }
}
