//! Host service lifecycle
//!
//! Keeps the hosting process in the foreground while audio is active and
//! lets it drop back once playback has been paused for a grace period, or
//! immediately once playback is over.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::snapshot::PlaybackSnapshot;
use crate::types::TransportState;

/// Host process priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostMode {
    /// Ordinary, may be reclaimed by the OS
    #[default]
    Background,
    /// Audio-visible and protected from reclamation
    Foreground,
}

/// Change the host should apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Promote,
    Demote,
}

/// Platform hook for promoting/demoting the host process
pub trait HostService: Send {
    fn promote(&mut self);
    fn demote(&mut self);
}

/// Foreground/background policy
#[derive(Debug, Clone)]
pub struct HostLifecycle {
    grace: Duration,
    mode: HostMode,
    /// When the current continuous pause began
    paused_since: Option<Instant>,
}

impl HostLifecycle {
    /// Create a lifecycle with the given pause grace period
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            mode: HostMode::Background,
            paused_since: None,
        }
    }

    /// Current mode
    pub fn mode(&self) -> HostMode {
        self.mode
    }

    /// When a pending demotion falls due
    pub fn deadline(&self) -> Option<Instant> {
        match self.mode {
            HostMode::Foreground => self.paused_since.map(|since| since + self.grace),
            HostMode::Background => None,
        }
    }

    /// React to a transport state observed at `now`
    pub fn observe(&mut self, transport: &TransportState, now: Instant) -> Option<HostAction> {
        match transport {
            TransportState::Buffering | TransportState::Playing => {
                self.paused_since = None;
                self.set_mode(HostMode::Foreground)
            }
            TransportState::Paused => {
                if self.mode == HostMode::Foreground && self.paused_since.is_none() {
                    self.paused_since = Some(now);
                }
                self.poll(now)
            }
            TransportState::Idle | TransportState::Stopped | TransportState::Error(_) => {
                self.paused_since = None;
                self.set_mode(HostMode::Background)
            }
        }
    }

    /// Demote if the grace period has run out
    pub fn poll(&mut self, now: Instant) -> Option<HostAction> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.paused_since = None;
                self.set_mode(HostMode::Background)
            }
            _ => None,
        }
    }

    fn set_mode(&mut self, mode: HostMode) -> Option<HostAction> {
        if self.mode == mode {
            return None;
        }
        self.mode = mode;
        Some(match mode {
            HostMode::Foreground => HostAction::Promote,
            HostMode::Background => HostAction::Demote,
        })
    }
}

/// Drive `service` from the snapshot channel until it closes
pub async fn run_host(
    mut lifecycle: HostLifecycle,
    mut service: Box<dyn HostService>,
    mut snapshots: watch::Receiver<PlaybackSnapshot>,
) {
    let apply = |service: &mut Box<dyn HostService>, action: Option<HostAction>| match action {
        Some(HostAction::Promote) => {
            info!("Promoting host to foreground");
            service.promote();
        }
        Some(HostAction::Demote) => {
            info!("Demoting host to background");
            service.demote();
        }
        None => {}
    };

    let transport = snapshots.borrow_and_update().transport.clone();
    apply(&mut service, lifecycle.observe(&transport, Instant::now()));

    loop {
        let deadline = lifecycle.deadline();
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let transport = snapshots.borrow_and_update().transport.clone();
                apply(&mut service, lifecycle.observe(&transport, Instant::now()));
            }
            () = sleep_until_opt(deadline) => {
                apply(&mut service, lifecycle.poll(Instant::now()));
            }
        }
    }
    debug!("Host lifecycle stopped");
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const GRACE: Duration = Duration::from_secs(30);

    #[test]
    fn active_states_promote() {
        let mut host = HostLifecycle::new(GRACE);
        let now = Instant::now();
        assert_eq!(
            host.observe(&TransportState::Buffering, now),
            Some(HostAction::Promote)
        );
        assert_eq!(host.observe(&TransportState::Playing, now), None);
        assert_eq!(host.mode(), HostMode::Foreground);
    }

    #[test]
    fn pause_demotes_only_after_grace() {
        let mut host = HostLifecycle::new(GRACE);
        let start = Instant::now();
        host.observe(&TransportState::Playing, start);
        assert_eq!(host.observe(&TransportState::Paused, start), None);

        assert_eq!(host.poll(start + Duration::from_secs(29)), None);
        assert_eq!(
            host.poll(start + Duration::from_secs(30)),
            Some(HostAction::Demote)
        );
        assert_eq!(host.deadline(), None);
    }

    #[test]
    fn resume_within_grace_cancels_demotion() {
        let mut host = HostLifecycle::new(GRACE);
        let start = Instant::now();
        host.observe(&TransportState::Playing, start);
        host.observe(&TransportState::Paused, start);
        host.observe(&TransportState::Playing, start + Duration::from_secs(10));

        assert_eq!(host.deadline(), None);
        assert_eq!(host.poll(start + Duration::from_secs(60)), None);
        assert_eq!(host.mode(), HostMode::Foreground);
    }

    #[test]
    fn repeated_paused_snapshots_keep_original_deadline() {
        let mut host = HostLifecycle::new(GRACE);
        let start = Instant::now();
        host.observe(&TransportState::Playing, start);
        host.observe(&TransportState::Paused, start);
        host.observe(&TransportState::Paused, start + Duration::from_secs(20));
        assert_eq!(host.deadline(), Some(start + GRACE));
    }

    #[test]
    fn stop_demotes_immediately() {
        let mut host = HostLifecycle::new(GRACE);
        let now = Instant::now();
        host.observe(&TransportState::Playing, now);
        assert_eq!(
            host.observe(&TransportState::Stopped, now),
            Some(HostAction::Demote)
        );
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<HostAction>>>);

    impl HostService for Recorder {
        fn promote(&mut self) {
            self.0.lock().unwrap().push(HostAction::Promote);
        }
        fn demote(&mut self) {
            self.0.lock().unwrap().push(HostAction::Demote);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn driver_demotes_after_grace_period() {
        let (tx, rx) = watch::channel(PlaybackSnapshot::default());
        let recorder = Recorder::default();
        let task = tokio::spawn(run_host(
            HostLifecycle::new(GRACE),
            Box::new(recorder.clone()),
            rx,
        ));

        tx.send_modify(|s| s.transport = TransportState::Playing);
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send_modify(|s| s.transport = TransportState::Paused);
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(*recorder.0.lock().unwrap(), vec![HostAction::Promote]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![HostAction::Promote, HostAction::Demote]
        );

        drop(tx);
        task.await.unwrap();
    }
}
