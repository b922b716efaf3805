//! Audio health monitoring
//!
//! A fixed-interval sweep over the mesh, active only while the local role is
//! listener and the room is live. A link that claims connected must actually
//! be producing audio; stalled output gets a resume nudge, dead transports
//! get force-reconnected, and a fully silent mesh gets rebuilt toward every
//! known speaker. Polling doubles as general self-healing, which is why it
//! stays a sweep instead of growing more events.

use crate::media::publisher::RolePublisher;
use crate::peer::link::{LinkEvent, LinkState};
use crate::peer::registry::LinkRegistry;
use crate::room::{Role, RoomStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Periodic verifier for listener-side audio flow
pub struct AudioHealthMonitor {
    registry: Arc<LinkRegistry>,
    publisher: Arc<RolePublisher>,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl AudioHealthMonitor {
    /// Create a monitor sweeping at `interval`
    pub fn new(
        registry: Arc<LinkRegistry>,
        publisher: Arc<RolePublisher>,
        interval: Duration,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            registry,
            publisher,
            interval,
            event_tx,
        }
    }

    /// The sweep interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep against the current room view
    ///
    /// `speakers` is the roster of currently known publishing participants,
    /// used for the full-mesh rebuild when nothing is audible.
    pub async fn sweep(&self, status: RoomStatus, speakers: &[String]) {
        if self.publisher.role().await != Role::Listener || status != RoomStatus::Live {
            return;
        }

        let links = self.registry.all().await;
        if links.is_empty() && speakers.is_empty() {
            return;
        }

        let mut any_audible = false;
        let mut dead: Vec<String> = Vec::new();
        let mut connecting_too_long = false;

        for link in &links {
            let remote_id = link.remote_id().to_string();
            match link.state().await {
                LinkState::Connected => match link.playback().await {
                    Some(playback) => {
                        if !playback.is_live().await {
                            debug!(peer_id = %remote_id, "Connected link has no live inbound audio");
                        } else if playback.is_playing().await {
                            any_audible = true;
                        } else {
                            warn!(peer_id = %remote_id, "Playback stalled; forcing resume");
                            if let Err(e) = playback.resume().await {
                                warn!(peer_id = %remote_id, "Failed to resume playback: {}", e);
                            } else {
                                any_audible = true;
                            }
                        }
                    }
                    None => {
                        debug!(peer_id = %remote_id, "Connected link has no bound inbound track");
                    }
                },
                LinkState::Failed | LinkState::Poor => {
                    dead.push(remote_id);
                }
                _ => {
                    if link.created_at().elapsed() >= self.interval {
                        connecting_too_long = true;
                    }
                }
            }
        }

        if any_audible {
            return;
        }

        let mut targeted: HashSet<String> = HashSet::new();

        // Nothing audible and the mesh has been trying for a while: kick the
        // transports that are known dead
        if connecting_too_long || !dead.is_empty() {
            for remote_id in dead {
                info!(peer_id = %remote_id, "Health sweep forcing reconnect of dead link");
                if targeted.insert(remote_id.clone()) {
                    let _ = self.event_tx.send(LinkEvent::RelinkDue { remote_id });
                }
            }
        }

        // No healthy link at all: rebuild toward every known speaker. Links
        // still inside their first sweep interval get time to finish
        let undecided = links.len() - targeted.len();
        if undecided == 0 || connecting_too_long {
            for speaker in speakers {
                if targeted.insert(speaker.clone()) {
                    info!(peer_id = %speaker, "Health sweep rebuilding speaker link");
                    let _ = self.event_tx.send(LinkEvent::RelinkDue {
                        remote_id: speaker.clone(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoomSessionConfig;
    use crate::media::playback::{DiscardPlaybackFactory, PlaybackHandle};
    use crate::media::source::{SharedAudioSource, StaticOpusSource};
    use crate::peer::reconnect::ReconnectSupervisor;
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakePlayback {
        live: AtomicBool,
        playing: AtomicBool,
    }

    impl FakePlayback {
        fn new(live: bool, playing: bool) -> Arc<Self> {
            Arc::new(Self {
                live: AtomicBool::new(live),
                playing: AtomicBool::new(playing),
            })
        }
    }

    #[async_trait]
    impl PlaybackHandle for FakePlayback {
        async fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        async fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }

        async fn resume(&self) -> Result<()> {
            self.playing.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {}
    }

    struct Harness {
        registry: Arc<LinkRegistry>,
        monitor: AudioHealthMonitor,
        rx: mpsc::UnboundedReceiver<LinkEvent>,
    }

    fn harness(role: Role) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = RoomSessionConfig::default();
        let source = Arc::new(SharedAudioSource::new(Arc::new(StaticOpusSource::new(
            "room-1",
        ))));
        let supervisor = Arc::new(ReconnectSupervisor::new(&config, tx.clone()));
        let registry = Arc::new(LinkRegistry::new(
            config.clone(),
            Arc::clone(&source),
            Arc::new(DiscardPlaybackFactory),
            supervisor,
            tx.clone(),
        ));
        let publisher = Arc::new(RolePublisher::new(role, source));
        let monitor = AudioHealthMonitor::new(
            Arc::clone(&registry),
            publisher,
            config.health_check_interval(),
            tx,
        );
        Harness {
            registry,
            monitor,
            rx,
        }
    }

    fn relink_targets(rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> Vec<String> {
        let mut targets = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LinkEvent::RelinkDue { remote_id } = event {
                targets.push(remote_id);
            }
        }
        targets
    }

    #[tokio::test]
    async fn test_inactive_unless_listener_and_live() {
        let mut h = harness(Role::Speaker);
        h.monitor.sweep(RoomStatus::Live, &["a".to_string()]).await;
        assert!(relink_targets(&mut h.rx).is_empty());

        let mut h = harness(Role::Listener);
        h.monitor
            .sweep(RoomStatus::Scheduled, &["a".to_string()])
            .await;
        assert!(relink_targets(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn test_healthy_link_triggers_nothing() {
        let mut h = harness(Role::Listener);
        let link = h.registry.ensure_link("speaker-a").await.unwrap();
        link.force_state(LinkState::Connected).await;
        link.install_binding(FakePlayback::new(true, true)).await;

        h.monitor
            .sweep(RoomStatus::Live, &["speaker-a".to_string()])
            .await;
        assert!(relink_targets(&mut h.rx).is_empty());

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_stalled_playback_is_resumed() {
        let mut h = harness(Role::Listener);
        let link = h.registry.ensure_link("speaker-a").await.unwrap();
        link.force_state(LinkState::Connected).await;
        let playback = FakePlayback::new(true, false);
        link.install_binding(Arc::clone(&playback) as Arc<dyn PlaybackHandle>)
            .await;

        h.monitor
            .sweep(RoomStatus::Live, &["speaker-a".to_string()])
            .await;

        assert!(playback.playing.load(Ordering::SeqCst));
        assert!(relink_targets(&mut h.rx).is_empty());

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_dead_links_are_force_reconnected() {
        let mut h = harness(Role::Listener);
        let failed = h.registry.ensure_link("speaker-a").await.unwrap();
        failed.force_state(LinkState::Failed).await;
        let poor = h.registry.ensure_link("speaker-b").await.unwrap();
        poor.force_state(LinkState::Poor).await;

        h.monitor
            .sweep(
                RoomStatus::Live,
                &["speaker-a".to_string(), "speaker-b".to_string()],
            )
            .await;

        let mut targets = relink_targets(&mut h.rx);
        targets.sort();
        assert_eq!(targets, vec!["speaker-a", "speaker-b"]);

        h.registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_silent_mesh_rebuilds_toward_speakers() {
        let mut h = harness(Role::Listener);

        h.monitor
            .sweep(
                RoomStatus::Live,
                &["speaker-a".to_string(), "speaker-b".to_string()],
            )
            .await;

        let mut targets = relink_targets(&mut h.rx);
        targets.sort();
        assert_eq!(targets, vec!["speaker-a", "speaker-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_negotiation_is_left_alone() {
        let mut h = harness(Role::Listener);
        let link = h.registry.ensure_link("speaker-a").await.unwrap();
        link.force_state(LinkState::Negotiating).await;

        // Young link still within the sweep interval
        h.monitor
            .sweep(RoomStatus::Live, &["speaker-a".to_string()])
            .await;
        assert!(relink_targets(&mut h.rx).is_empty());

        h.registry.remove_all().await;
    }
}
