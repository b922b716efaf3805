//! Inbound signaling event routing
//!
//! One dispatcher per room session. Events from the relay are routed to the
//! right peer link, links are created on demand, and the offer/answer
//! choreography (including glare resolution and candidate buffering) lives
//! here. Negotiation failures stay local to one link; capability failures
//! propagate to the caller.

use crate::media::publisher::RolePublisher;
use crate::peer::link::{LinkEvent, LinkState, PeerLink};
use crate::peer::registry::LinkRegistry;
use crate::peer::reconnect::ReconnectSupervisor;
use crate::room::{RecordingState, Role, RoomSnapshot, RoomStatus};
use crate::signaling::protocol::SignalEvent;
use crate::signaling::SignalingSink;
use crate::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Routes relay events into the peer mesh
pub struct SignalingDispatcher {
    local_id: String,
    room_id: String,
    registry: Arc<LinkRegistry>,
    publisher: Arc<RolePublisher>,
    supervisor: Arc<ReconnectSupervisor>,
    sink: Arc<dyn SignalingSink>,
    snapshot: Arc<RwLock<RoomSnapshot>>,
    recording: Arc<RwLock<RecordingState>>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl SignalingDispatcher {
    /// Create a dispatcher for one room session
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_id: String,
        room_id: String,
        registry: Arc<LinkRegistry>,
        publisher: Arc<RolePublisher>,
        supervisor: Arc<ReconnectSupervisor>,
        sink: Arc<dyn SignalingSink>,
        snapshot: Arc<RwLock<RoomSnapshot>>,
        recording: Arc<RwLock<RecordingState>>,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            local_id,
            room_id,
            registry,
            publisher,
            supervisor,
            sink,
            snapshot,
            recording,
            event_tx,
        }
    }

    /// Route one inbound relay event
    ///
    /// Events for other rooms, self-originated events, and peer-addressed
    /// events for someone else are silently dropped. Only capability errors
    /// surface; everything else is handled locally per link.
    pub async fn dispatch(&self, event: SignalEvent) -> Result<()> {
        if event.room_id() != self.room_id {
            debug!(room_id = %event.room_id(), "Dropping event for another room");
            return Ok(());
        }
        if event.from_id() == Some(self.local_id.as_str()) {
            return Ok(());
        }

        match event {
            SignalEvent::Ready {
                from_id, target_id, ..
            } => {
                if target_id != self.local_id {
                    return Ok(());
                }
                self.handle_ready(&from_id).await
            }
            SignalEvent::Offer {
                from_id,
                target_id,
                sdp,
                ..
            } => {
                if target_id != self.local_id {
                    return Ok(());
                }
                self.handle_offer(&from_id, sdp).await
            }
            SignalEvent::Answer {
                from_id,
                target_id,
                sdp,
                ..
            } => {
                if target_id != self.local_id {
                    return Ok(());
                }
                self.handle_answer(&from_id, sdp).await;
                Ok(())
            }
            SignalEvent::Candidate {
                from_id,
                target_id,
                candidate,
                ..
            } => {
                if target_id != self.local_id {
                    return Ok(());
                }
                self.handle_candidate(&from_id, candidate).await;
                Ok(())
            }
            SignalEvent::ParticipantJoined { user_id, role, .. } => {
                if user_id != self.local_id {
                    info!(peer_id = %user_id, ?role, "Participant joined");
                    self.snapshot.write().await.add_participant(&user_id, role);
                }
                Ok(())
            }
            SignalEvent::ParticipantLeft { user_id, .. } => {
                if user_id != self.local_id {
                    info!(peer_id = %user_id, "Participant left");
                    self.snapshot.write().await.remove_participant(&user_id);
                    self.registry.remove(&user_id).await;
                    self.supervisor.forget(&user_id);
                }
                Ok(())
            }
            SignalEvent::RoomStatusChanged { status, .. } => {
                info!(?status, "Room status changed");
                self.snapshot.write().await.status = status;
                if status == RoomStatus::Ended {
                    let _ = self.event_tx.send(LinkEvent::RoomEnded);
                }
                Ok(())
            }
            SignalEvent::RecordingStatus {
                is_recording,
                recording_id,
                ..
            } => {
                debug!(is_recording, "Recording status changed");
                *self.recording.write().await = RecordingState {
                    is_recording,
                    recording_id,
                };
                Ok(())
            }
        }
    }

    /// A peer announced readiness: take the offering side toward it
    async fn handle_ready(&self, from_id: &str) -> Result<()> {
        let link = self.registry.ensure_link(from_id).await?;
        if link.state().await != LinkState::New {
            debug!(peer_id = %from_id, "Ready for peer already negotiating; ignoring");
            return Ok(());
        }
        self.offer_on(link).await
    }

    async fn handle_offer(&self, from_id: &str, sdp: String) -> Result<()> {
        let link = self.registry.ensure_link(from_id).await?;

        // Glare: both sides offered at once. The lexicographically lower id
        // yields and answers the inbound offer on a fresh link; the higher
        // id drops the inbound offer and waits for its own answer.
        let link = if link.state().await == LinkState::Offering && link.local_description_sent() {
            if self.local_id.as_str() < from_id {
                info!(peer_id = %from_id, "Offer glare; yielding to remote offer");
                self.registry.replace_link(from_id).await?
            } else {
                debug!(peer_id = %from_id, "Offer glare; keeping local offer");
                return Ok(());
            }
        } else {
            link
        };

        // The relay delivers at least once, so an offer can arrive again
        // after negotiation has moved on. Only a link still waiting for its
        // first remote description takes this one; a dead link is rebuilt
        // to answer; anything else is a redelivery to drop.
        let link = match link.state().await {
            LinkState::New => link,
            LinkState::Offering if !link.local_description_sent() => link,
            LinkState::Failed | LinkState::Closed => {
                info!(peer_id = %from_id, "Offer for a dead link; rebuilding to answer");
                self.registry.replace_link(from_id).await?
            }
            state => {
                debug!(peer_id = %from_id, ?state, "Redelivered offer; ignoring");
                return Ok(());
            }
        };

        self.publisher.prepare(&link).await?;

        let answered = self.answer_inbound_offer(&link, sdp).await;
        if let Err(e) = answered {
            warn!(peer_id = %from_id, "Negotiation failed on inbound offer: {}", e);
            self.registry.remove(from_id).await;
        }
        Ok(())
    }

    async fn answer_inbound_offer(&self, link: &Arc<PeerLink>, sdp: String) -> Result<()> {
        link.apply_remote_offer(sdp).await?;
        self.apply_buffered_candidates(link).await;

        let answer = link.create_answer().await?;
        self.sink
            .send(SignalEvent::Answer {
                room_id: self.room_id.clone(),
                from_id: self.local_id.clone(),
                target_id: link.remote_id().to_string(),
                sdp: answer,
            })
            .await
    }

    async fn handle_answer(&self, from_id: &str, sdp: String) {
        let Some(link) = self.registry.get(from_id).await else {
            // Ordering anomaly, e.g. an answer straggling in after a
            // teardown. Not fatal.
            warn!(peer_id = %from_id, "Answer with no matching link; ignoring");
            return;
        };

        if link.state().await != LinkState::Offering {
            // Redelivered answer after the link moved on. Not fatal.
            debug!(peer_id = %from_id, "Answer for link with no offer pending; ignoring");
            return;
        }

        if let Err(e) = link.apply_remote_answer(sdp).await {
            warn!(peer_id = %from_id, "Negotiation failed on inbound answer: {}", e);
            self.registry.remove(from_id).await;
            return;
        }

        self.apply_buffered_candidates(&link).await;
    }

    async fn handle_candidate(&self, from_id: &str, candidate: String) {
        let link = self.registry.get(from_id).await;
        let ready = match &link {
            Some(link) => link.has_remote_description(),
            None => false,
        };

        if !ready {
            self.registry.candidates().push(from_id, candidate).await;
            return;
        }

        if let Some(link) = link {
            if let Err(e) = link.apply_candidate(&candidate).await {
                warn!(peer_id = %from_id, "Rejected candidate tears link down: {}", e);
                self.registry.remove(from_id).await;
            }
        }
    }

    /// Drain and apply buffered candidates in arrival order
    ///
    /// Runs immediately after the remote description is applied, before the
    /// dispatcher returns to the event loop, so no later candidate can jump
    /// the queue.
    async fn apply_buffered_candidates(&self, link: &Arc<PeerLink>) {
        let buffered = self.registry.candidates().drain(link.remote_id()).await;
        if buffered.is_empty() {
            return;
        }

        debug!(
            peer_id = %link.remote_id(),
            count = buffered.len(),
            "Applying buffered candidates"
        );
        for candidate in buffered {
            if let Err(e) = link.apply_candidate(&candidate).await {
                warn!(peer_id = %link.remote_id(), "Buffered candidate rejected: {}", e);
            }
        }
    }

    /// Announce availability toward `target_id` over the relay
    pub async fn announce_ready(&self, target_id: &str) -> Result<()> {
        self.sink
            .send(SignalEvent::Ready {
                room_id: self.room_id.clone(),
                from_id: self.local_id.clone(),
                target_id: target_id.to_string(),
            })
            .await
    }

    /// Relay one locally gathered candidate to `target_id`
    pub async fn send_candidate(&self, target_id: &str, candidate: String) -> Result<()> {
        self.sink
            .send(SignalEvent::Candidate {
                room_id: self.room_id.clone(),
                from_id: self.local_id.clone(),
                target_id: target_id.to_string(),
                candidate,
            })
            .await
    }

    /// Tear down and rebuild the link to `remote_id` with a locally
    /// initiated offer
    ///
    /// The rebuild always offers from this side regardless of who initiated
    /// originally, so both sides cannot end up waiting on each other.
    pub async fn relink(&self, remote_id: &str) -> Result<()> {
        info!(peer_id = %remote_id, "Rebuilding peer link");
        self.registry.remove(remote_id).await;
        let link = self.registry.ensure_link(remote_id).await?;
        self.publisher.prepare(&link).await?;
        self.offer_from(link).await
    }

    /// Begin a fresh offer on a link already prepared with media
    async fn offer_from(&self, link: Arc<PeerLink>) -> Result<()> {
        let remote_id = link.remote_id().to_string();
        let offer = match link.begin_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                warn!(peer_id = %remote_id, "Failed to create offer: {}", e);
                self.registry.remove(&remote_id).await;
                return Ok(());
            }
        };

        self.sink
            .send(SignalEvent::Offer {
                room_id: self.room_id.clone(),
                from_id: self.local_id.clone(),
                target_id: remote_id,
                sdp: offer,
            })
            .await
    }

    /// Prepare media on `link` and send an offer
    async fn offer_on(&self, link: Arc<PeerLink>) -> Result<()> {
        self.publisher.prepare(&link).await?;
        self.offer_from(link).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomSessionConfig;
    use crate::media::playback::DiscardPlaybackFactory;
    use crate::media::source::{SharedAudioSource, StaticOpusSource};
    use std::sync::Mutex as StdMutex;

    /// Sink that records everything sent through it
    pub(crate) struct RecordingSink {
        pub sent: StdMutex<Vec<SignalEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn sent_events(&self) -> Vec<SignalEvent> {
            self.sent.lock().map(|g| g.clone()).unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl SignalingSink for RecordingSink {
        async fn send(&self, event: SignalEvent) -> Result<()> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(event);
            }
            Ok(())
        }
    }

    struct Harness {
        dispatcher: SignalingDispatcher,
        registry: Arc<LinkRegistry>,
        sink: Arc<RecordingSink>,
        snapshot: Arc<RwLock<RoomSnapshot>>,
        recording: Arc<RwLock<RecordingState>>,
        rx: mpsc::UnboundedReceiver<LinkEvent>,
    }

    fn harness(local_id: &str, role: Role) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = RoomSessionConfig::default();
        let source = Arc::new(SharedAudioSource::new(Arc::new(StaticOpusSource::new(
            "room-1",
        ))));
        let supervisor = Arc::new(ReconnectSupervisor::new(&config, tx.clone()));
        let registry = Arc::new(LinkRegistry::new(
            config,
            Arc::clone(&source),
            Arc::new(DiscardPlaybackFactory),
            Arc::clone(&supervisor),
            tx.clone(),
        ));
        let publisher = Arc::new(RolePublisher::new(role, source));
        let sink = RecordingSink::new();
        let snapshot = Arc::new(RwLock::new(RoomSnapshot {
            room_id: "room-1".to_string(),
            status: RoomStatus::Live,
            host_id: "host".to_string(),
            speakers: vec!["host".to_string()],
            listeners: vec![local_id.to_string()],
        }));
        let recording = Arc::new(RwLock::new(RecordingState::default()));

        let dispatcher = SignalingDispatcher::new(
            local_id.to_string(),
            "room-1".to_string(),
            Arc::clone(&registry),
            publisher,
            supervisor,
            sink.clone() as Arc<dyn SignalingSink>,
            Arc::clone(&snapshot),
            Arc::clone(&recording),
            tx,
        );

        Harness {
            dispatcher,
            registry,
            sink,
            snapshot,
            recording,
            rx,
        }
    }

    fn offer_from(peer: &str, target: &str, sdp: &str) -> SignalEvent {
        SignalEvent::Offer {
            room_id: "room-1".to_string(),
            from_id: peer.to_string(),
            target_id: target.to_string(),
            sdp: sdp.to_string(),
        }
    }

    async fn valid_offer_sdp() -> String {
        let (tx, _rx) = mpsc::unbounded_channel();
        let link = PeerLink::new(
            "scratch".to_string(),
            &RoomSessionConfig::default(),
            Arc::new(DiscardPlaybackFactory),
            tx,
        )
        .await
        .unwrap();
        link.declare_recv_only().await.unwrap();
        let sdp = link.begin_offer().await.unwrap();
        link.close().await;
        sdp
    }

    #[tokio::test]
    async fn test_other_rooms_and_self_origin_are_dropped() {
        let h = harness("me", Role::Listener);

        let foreign = SignalEvent::Ready {
            room_id: "room-2".to_string(),
            from_id: "host".to_string(),
            target_id: "me".to_string(),
        };
        h.dispatcher.dispatch(foreign).await.unwrap();

        let self_origin = SignalEvent::Ready {
            room_id: "room-1".to_string(),
            from_id: "me".to_string(),
            target_id: "host".to_string(),
        };
        h.dispatcher.dispatch(self_origin).await.unwrap();

        let someone_elses = SignalEvent::Ready {
            room_id: "room-1".to_string(),
            from_id: "host".to_string(),
            target_id: "other".to_string(),
        };
        h.dispatcher.dispatch(someone_elses).await.unwrap();

        assert_eq!(h.registry.count().await, 0);
        assert!(h.sink.sent_events().is_empty());
    }

    #[tokio::test]
    async fn test_ready_creates_link_and_sends_offer() {
        let h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::Ready {
                room_id: "room-1".to_string(),
                from_id: "host".to_string(),
                target_id: "me".to_string(),
            })
            .await
            .unwrap();

        let link = h.registry.get("host").await.unwrap();
        assert_eq!(link.state().await, LinkState::Offering);
        assert!(link.recv_intent_declared());

        let sent = h.sink.sent_events();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], SignalEvent::Offer { target_id, .. } if target_id == "host"));

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_inbound_offer_is_answered() {
        let h = harness("me", Role::Listener);
        let sdp = valid_offer_sdp().await;

        h.dispatcher
            .dispatch(offer_from("host", "me", &sdp))
            .await
            .unwrap();

        let link = h.registry.get("host").await.unwrap();
        assert_eq!(link.state().await, LinkState::Negotiating);

        let sent = h.sink.sent_events();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], SignalEvent::Answer { target_id, .. } if target_id == "host"));

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_malformed_offer_tears_link_down_quietly() {
        let h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(offer_from("host", "me", "not sdp"))
            .await
            .unwrap();

        assert!(h.registry.get("host").await.is_none());
        assert!(h.sink.sent_events().is_empty());
    }

    #[tokio::test]
    async fn test_glare_lower_id_yields() {
        let h = harness("aaa", Role::Listener);

        // Local side has an offer in flight toward zzz
        h.dispatcher
            .dispatch(SignalEvent::Ready {
                room_id: "room-1".to_string(),
                from_id: "zzz".to_string(),
                target_id: "aaa".to_string(),
            })
            .await
            .unwrap();
        let original = h.registry.get("zzz").await.unwrap();
        assert_eq!(original.state().await, LinkState::Offering);

        let sdp = valid_offer_sdp().await;
        h.dispatcher
            .dispatch(offer_from("zzz", "aaa", &sdp))
            .await
            .unwrap();

        // Fresh link answered the remote offer; the abandoned one is closed
        let replacement = h.registry.get("zzz").await.unwrap();
        assert!(!Arc::ptr_eq(&original, &replacement));
        assert_eq!(original.state().await, LinkState::Closed);
        assert_eq!(replacement.state().await, LinkState::Negotiating);

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_glare_higher_id_keeps_its_offer() {
        let h = harness("zzz", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::Ready {
                room_id: "room-1".to_string(),
                from_id: "aaa".to_string(),
                target_id: "zzz".to_string(),
            })
            .await
            .unwrap();
        let original = h.registry.get("aaa").await.unwrap();

        let sdp = valid_offer_sdp().await;
        h.dispatcher
            .dispatch(offer_from("aaa", "zzz", &sdp))
            .await
            .unwrap();

        let kept = h.registry.get("aaa").await.unwrap();
        assert!(Arc::ptr_eq(&original, &kept));
        assert_eq!(kept.state().await, LinkState::Offering);

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_redelivered_offer_leaves_link_intact() {
        let h = harness("me", Role::Listener);
        let sdp = valid_offer_sdp().await;

        h.dispatcher
            .dispatch(offer_from("host", "me", &sdp))
            .await
            .unwrap();
        let link = h.registry.get("host").await.unwrap();
        assert_eq!(link.state().await, LinkState::Negotiating);

        // The relay delivers at least once; the duplicate must not touch
        // the link that already answered
        h.dispatcher
            .dispatch(offer_from("host", "me", &sdp))
            .await
            .unwrap();

        let kept = h.registry.get("host").await.unwrap();
        assert!(Arc::ptr_eq(&link, &kept));
        assert_eq!(kept.state().await, LinkState::Negotiating);

        let answers = h
            .sink
            .sent_events()
            .iter()
            .filter(|e| matches!(e, SignalEvent::Answer { .. }))
            .count();
        assert_eq!(answers, 1);

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_offer_for_dead_link_is_answered_on_fresh_link() {
        let h = harness("me", Role::Listener);
        let old = h.registry.ensure_link("host").await.unwrap();
        old.force_state(LinkState::Failed).await;

        let sdp = valid_offer_sdp().await;
        h.dispatcher
            .dispatch(offer_from("host", "me", &sdp))
            .await
            .unwrap();

        let rebuilt = h.registry.get("host").await.unwrap();
        assert!(!Arc::ptr_eq(&old, &rebuilt));
        assert_eq!(rebuilt.state().await, LinkState::Negotiating);

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_redelivered_answer_is_ignored() {
        let h = harness("me", Role::Listener);
        let link = h.registry.ensure_link("host").await.unwrap();
        link.force_state(LinkState::Negotiating).await;

        h.dispatcher
            .dispatch(SignalEvent::Answer {
                room_id: "room-1".to_string(),
                from_id: "host".to_string(),
                target_id: "me".to_string(),
                sdp: "v=0".to_string(),
            })
            .await
            .unwrap();

        let kept = h.registry.get("host").await.unwrap();
        assert!(Arc::ptr_eq(&link, &kept));
        assert_eq!(kept.state().await, LinkState::Negotiating);

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_answer_without_link_is_ignored() {
        let h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::Answer {
                room_id: "room-1".to_string(),
                from_id: "ghost".to_string(),
                target_id: "me".to_string(),
                sdp: "v=0".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(h.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_early_candidate_is_buffered() {
        let h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::Candidate {
                room_id: "room-1".to_string(),
                from_id: "host".to_string(),
                target_id: "me".to_string(),
                candidate: "{\"candidate\":\"x\"}".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(h.registry.candidates().len("host").await, 1);
        assert_eq!(h.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_participant_events_update_roster() {
        let h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::ParticipantJoined {
                room_id: "room-1".to_string(),
                user_id: "dave".to_string(),
                role: Role::Speaker,
            })
            .await
            .unwrap();
        assert!(h
            .snapshot
            .read()
            .await
            .speakers
            .contains(&"dave".to_string()));
        // Joining alone creates no link; the ready exchange does
        assert_eq!(h.registry.count().await, 0);

        h.registry.ensure_link("dave").await.unwrap();
        h.dispatcher
            .dispatch(SignalEvent::ParticipantLeft {
                room_id: "room-1".to_string(),
                user_id: "dave".to_string(),
            })
            .await
            .unwrap();
        assert!(h.registry.get("dave").await.is_none());
        assert!(!h
            .snapshot
            .read()
            .await
            .speakers
            .contains(&"dave".to_string()));
    }

    #[tokio::test]
    async fn test_room_end_emits_teardown_event() {
        let mut h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::RoomStatusChanged {
                room_id: "room-1".to_string(),
                status: RoomStatus::Ended,
            })
            .await
            .unwrap();

        assert_eq!(h.snapshot.read().await.status, RoomStatus::Ended);
        let mut saw_end = false;
        while let Ok(event) = h.rx.try_recv() {
            if matches!(event, LinkEvent::RoomEnded) {
                saw_end = true;
            }
        }
        assert!(saw_end);
    }

    #[tokio::test]
    async fn test_recording_status_is_tracked() {
        let h = harness("me", Role::Listener);

        h.dispatcher
            .dispatch(SignalEvent::RecordingStatus {
                room_id: "room-1".to_string(),
                is_recording: true,
                recording_id: Some("rec-9".to_string()),
            })
            .await
            .unwrap();

        let state = h.recording.read().await.clone();
        assert!(state.is_recording);
        assert_eq!(state.recording_id.as_deref(), Some("rec-9"));
    }

    #[tokio::test]
    async fn test_relink_rebuilds_with_local_offer() {
        let h = harness("me", Role::Listener);

        let old = h.registry.ensure_link("host").await.unwrap();
        old.force_state(LinkState::Failed).await;

        h.dispatcher.relink("host").await.unwrap();

        let rebuilt = h.registry.get("host").await.unwrap();
        assert!(!Arc::ptr_eq(&old, &rebuilt));
        assert_eq!(rebuilt.state().await, LinkState::Offering);

        let sent = h.sink.sent_events();
        assert!(matches!(&sent[0], SignalEvent::Offer { target_id, .. } if target_id == "host"));

        h.registry.remove_all().await;
    }
}
