//! Room session orchestration
//!
//! One [`RoomSession`] per joined room per device. It owns the peer mesh and
//! every timer and sweep attached to it, drives the event loop that link
//! callbacks feed, and exposes the handful of operations the embedding
//! application calls: feed inbound signaling, connect to the roster, switch
//! role, leave.

use crate::config::RoomSessionConfig;
use crate::media::health::AudioHealthMonitor;
use crate::media::playback::PlaybackFactory;
use crate::media::publisher::RolePublisher;
use crate::media::source::{AudioSourceProvider, SharedAudioSource};
use crate::peer::link::{LinkEvent, LinkQuality, LinkState};
use crate::peer::registry::LinkRegistry;
use crate::peer::reconnect::ReconnectSupervisor;
use crate::room::{RecordingState, Role, RoomSnapshot, RoomStatus};
use crate::signaling::protocol::SignalEvent;
use crate::signaling::{SignalingDispatcher, SignalingSink};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The local device's live handle on one audio room
pub struct RoomSession {
    local_id: String,
    room_id: String,
    config: RoomSessionConfig,
    registry: Arc<LinkRegistry>,
    publisher: Arc<RolePublisher>,
    supervisor: Arc<ReconnectSupervisor>,
    dispatcher: SignalingDispatcher,
    monitor: AudioHealthMonitor,
    snapshot: Arc<RwLock<RoomSnapshot>>,
    recording: Arc<RwLock<RecordingState>>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    closed: AtomicBool,
    driver: StdMutex<Option<JoinHandle<()>>>,
    health_task: StdMutex<Option<JoinHandle<()>>>,
}

impl RoomSession {
    /// Build and start a session from a room snapshot
    ///
    /// Spawns the event driver and the health sweep; both stop when the
    /// session is torn down or dropped. Does not touch the network until
    /// [`connect_to_all_participants`](Self::connect_to_all_participants)
    /// or an inbound signaling event arrives.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        config: RoomSessionConfig,
        snapshot: RoomSnapshot,
        local_id: String,
        role: Role,
        sink: Arc<dyn SignalingSink>,
        source_provider: Arc<dyn AudioSourceProvider>,
        playback_factory: Arc<dyn PlaybackFactory>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let room_id = snapshot.room_id.clone();
        info!(room_id = %room_id, participant_id = %local_id, ?role, "Starting room session");

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let source = Arc::new(SharedAudioSource::new(source_provider));
        let supervisor = Arc::new(ReconnectSupervisor::new(&config, event_tx.clone()));
        let registry = Arc::new(LinkRegistry::new(
            config.clone(),
            Arc::clone(&source),
            playback_factory,
            Arc::clone(&supervisor),
            event_tx.clone(),
        ));
        let publisher = Arc::new(RolePublisher::new(role, source));
        let snapshot = Arc::new(RwLock::new(snapshot));
        let recording = Arc::new(RwLock::new(RecordingState::default()));

        let dispatcher = SignalingDispatcher::new(
            local_id.clone(),
            room_id.clone(),
            Arc::clone(&registry),
            Arc::clone(&publisher),
            Arc::clone(&supervisor),
            sink,
            Arc::clone(&snapshot),
            Arc::clone(&recording),
            event_tx.clone(),
        );

        let monitor = AudioHealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&publisher),
            config.health_check_interval(),
            event_tx.clone(),
        );

        let session = Arc::new(Self {
            local_id,
            room_id,
            config,
            registry,
            publisher,
            supervisor,
            dispatcher,
            monitor,
            snapshot,
            recording,
            event_tx,
            closed: AtomicBool::new(false),
            driver: StdMutex::new(None),
            health_task: StdMutex::new(None),
        });

        session.spawn_driver(event_rx);
        session.spawn_health_loop();

        Ok(session)
    }

    fn spawn_driver(self: &Arc<Self>, mut event_rx: mpsc::UnboundedReceiver<LinkEvent>) {
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.handle_link_event(event).await;
            }
        });

        if let Ok(mut guard) = self.driver.lock() {
            *guard = Some(handle);
        }
    }

    fn spawn_health_loop(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.monitor.interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if session.closed.load(Ordering::SeqCst) {
                    break;
                }
                let (status, speakers) = {
                    let snapshot = session.snapshot.read().await;
                    (snapshot.status, snapshot.speaker_ids(&session.local_id))
                };
                session.monitor.sweep(status, &speakers).await;
            }
        });

        if let Ok(mut guard) = self.health_task.lock() {
            *guard = Some(handle);
        }
    }

    async fn handle_link_event(self: &Arc<Self>, event: LinkEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }

        match event {
            LinkEvent::StateChanged {
                remote_id,
                link_id,
                state,
            } => {
                if !self.link_is_current(&remote_id, &link_id).await {
                    debug!(peer_id = %remote_id, "Ignoring state change from a stale link");
                    return;
                }
                match state {
                    LinkState::Connected => {
                        info!(peer_id = %remote_id, "Peer link connected");
                        self.supervisor.mark_connected(&remote_id);
                        if self.publisher.role().await == Role::Listener {
                            self.spawn_track_verification(remote_id, link_id);
                        }
                    }
                    LinkState::Poor => {
                        self.supervisor.schedule_degraded(&remote_id);
                    }
                    LinkState::Failed => {
                        self.handle_link_failure(&remote_id).await;
                    }
                    _ => {}
                }
            }
            LinkEvent::LocalCandidate {
                remote_id,
                link_id,
                candidate,
            } => {
                if !self.link_is_current(&remote_id, &link_id).await {
                    return;
                }
                if let Err(e) = self.dispatcher.send_candidate(&remote_id, candidate).await {
                    warn!(peer_id = %remote_id, "Failed to relay candidate: {}", e);
                }
            }
            LinkEvent::RemoteTrackBound { remote_id, .. } => {
                debug!(peer_id = %remote_id, "Remote audio track bound");
            }
            LinkEvent::ConnectTimeout { remote_id, link_id } => {
                if !self.link_is_current(&remote_id, &link_id).await {
                    return;
                }
                self.handle_link_failure(&remote_id).await;
            }
            LinkEvent::NoAudio { remote_id } => {
                // The connection itself is up, so the state stays put; the
                // degraded quality is what the health sweeps act on
                warn!(peer_id = %remote_id, "Connected link produced no audio in the verification window");
                if let Some(link) = self.registry.get(&remote_id).await {
                    link.mark_poor().await;
                }
            }
            LinkEvent::RelinkDue { remote_id } => {
                self.relink_if_unhealthy(&remote_id).await;
            }
            LinkEvent::RoomEnded => {
                info!(room_id = %self.room_id, "Room ended; tearing session down");
                self.teardown().await;
            }
        }
    }

    async fn link_is_current(&self, remote_id: &str, link_id: &str) -> bool {
        match self.registry.get(remote_id).await {
            Some(link) => link.link_id() == link_id,
            None => false,
        }
    }

    /// Failed or timed out: tear the link down and spend the single retry,
    /// or leave it visible as poor once the budget is gone
    ///
    /// Removing a link cancels its pending reconnect timer, so the retry
    /// must be armed only after the removal has run.
    async fn handle_link_failure(&self, remote_id: &str) {
        if self.supervisor.retry_available(remote_id) {
            self.registry.remove(remote_id).await;
            self.supervisor.schedule_retry(remote_id);
        } else if let Some(link) = self.registry.get(remote_id).await {
            link.mark_poor().await;
        }
    }

    fn spawn_track_verification(self: &Arc<Self>, remote_id: String, link_id: String) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let window = self.config.track_verify_window();

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            let Some(link) = session.registry.get(&remote_id).await else {
                return;
            };
            if link.link_id() != link_id || link.state().await != LinkState::Connected {
                return;
            }

            let live = match link.playback().await {
                Some(playback) => playback.is_live().await,
                None => false,
            };
            if !live {
                let _ = session.event_tx.send(LinkEvent::NoAudio { remote_id });
            }
        });
    }

    /// Rebuild the link unless it is demonstrably fine or still inside its
    /// own deadline
    async fn relink_if_unhealthy(&self, remote_id: &str) {
        if let Some(link) = self.registry.get(remote_id).await {
            match link.state().await {
                LinkState::Connected => {
                    let listener = self.publisher.role().await == Role::Listener;
                    let live = match link.playback().await {
                        Some(playback) => playback.is_live().await,
                        None => false,
                    };
                    if !listener || live {
                        debug!(peer_id = %remote_id, "Relink skipped; link is healthy");
                        return;
                    }
                }
                LinkState::Closed => {}
                LinkState::Failed | LinkState::Poor => {}
                _ => {
                    // Mid-negotiation with the watchdog still running
                    if link.created_at().elapsed() < self.config.connect_timeout() {
                        debug!(peer_id = %remote_id, "Relink skipped; negotiation still in flight");
                        return;
                    }
                }
            }
        }

        if let Err(e) = self.dispatcher.relink(remote_id).await {
            if e.is_capability() {
                warn!(peer_id = %remote_id, "Relink blocked by capability error: {}", e);
            } else {
                warn!(peer_id = %remote_id, "Relink failed: {}", e);
            }
        }
    }

    /// Feed one inbound relay event into the session
    pub async fn handle_signal(&self, event: SignalEvent) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        self.dispatcher.dispatch(event).await
    }

    /// Replace the room view with a fresh snapshot from the lifecycle API
    ///
    /// Links to participants no longer in the snapshot are dropped; new
    /// participants get linked through the usual `ready` exchange. A
    /// snapshot that reports the room ended tears the session down.
    pub async fn apply_snapshot(&self, snapshot: RoomSnapshot) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        if snapshot.room_id != self.room_id {
            return Err(Error::Signaling(format!(
                "Snapshot for room {} applied to session for room {}",
                snapshot.room_id, self.room_id
            )));
        }

        let status = snapshot.status;
        let roster = snapshot.roster(&self.local_id);
        *self.snapshot.write().await = snapshot;

        for remote_id in self.registry.peer_ids().await {
            if !roster.contains_key(&remote_id) {
                info!(peer_id = %remote_id, "Participant absent from snapshot; dropping link");
                self.registry.remove(&remote_id).await;
                self.supervisor.forget(&remote_id);
            }
        }

        if status == RoomStatus::Ended {
            self.teardown().await;
        }
        Ok(())
    }

    /// Announce availability to every other participant in the snapshot
    ///
    /// Creates a fresh link per target and sends each a `ready`, leaving
    /// offer initiation to whichever side reacts first.
    pub async fn connect_to_all_participants(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }

        let roster = self.snapshot.read().await.roster(&self.local_id);
        info!(targets = roster.len(), "Connecting to all participants");

        for target_id in roster.keys() {
            self.registry.ensure_link(target_id).await?;
            self.dispatcher.announce_ready(target_id).await?;
        }
        Ok(())
    }

    /// Switch the local role, rebuilding the full mesh under the new one
    ///
    /// A capability failure on the way into a publishing role aborts the
    /// switch before anything is torn down; the session keeps its old role
    /// and all its links.
    pub async fn switch_role(&self, new_role: Role) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }

        let old_role = self.publisher.role().await;
        if old_role == new_role {
            return Ok(());
        }

        if new_role.publishes() && !old_role.publishes() {
            self.publisher.source().probe().await?;
        }

        info!(from = ?old_role, to = ?new_role, "Switching role; rebuilding mesh");

        self.registry.remove_all().await;
        self.supervisor.shutdown();
        if old_role.publishes() && !new_role.publishes() {
            self.publisher.source().release_all().await;
        }
        self.publisher.set_role(new_role).await;

        self.connect_to_all_participants().await
    }

    /// Leave the room and release everything; idempotent
    pub async fn leave(&self) {
        info!(room_id = %self.room_id, "Leaving room");
        self.teardown().await;
    }

    async fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.registry.remove_all().await;
        self.supervisor.shutdown();
        self.publisher.source().release_all().await;

        if let Ok(mut guard) = self.health_task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        // Aborted last: teardown may be running on the driver itself
        if let Ok(mut guard) = self.driver.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    /// Local participant id
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Room id
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Current local role
    pub async fn role(&self) -> Role {
        self.publisher.role().await
    }

    /// Current room status
    pub async fn status(&self) -> RoomStatus {
        self.snapshot.read().await.status
    }

    /// Copy of the current room snapshot
    pub async fn snapshot(&self) -> RoomSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Recording state as last announced by the relay
    pub async fn recording_state(&self) -> RecordingState {
        self.recording.read().await.clone()
    }

    /// Number of live peer links
    pub async fn link_count(&self) -> usize {
        self.registry.count().await
    }

    /// Observed quality of the link to `remote_id`, if one exists
    pub async fn link_quality(&self, remote_id: &str) -> Option<LinkQuality> {
        match self.registry.get(remote_id).await {
            Some(link) => Some(link.quality().await),
            None => None,
        }
    }

    /// Negotiation state of the link to `remote_id`, if one exists
    pub async fn link_state(&self, remote_id: &str) -> Option<LinkState> {
        match self.registry.get(remote_id).await {
            Some(link) => Some(link.state().await),
            None => None,
        }
    }

    /// Whether the session has been torn down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Arc<LinkRegistry> {
        &self.registry
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.health_task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        if let Ok(mut guard) = self.driver.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
