//! Peer link registry
//!
//! Owns the per-room map of active peer links, at most one per remote
//! participant, together with the pending candidate buffer. All link
//! creation, replacement, and removal funnels through here so the
//! one-link-per-peer invariant and the paired resource cleanup cannot be
//! bypassed.

use crate::config::RoomSessionConfig;
use crate::media::playback::PlaybackFactory;
use crate::media::source::SharedAudioSource;
use crate::peer::candidates::PendingCandidates;
use crate::peer::link::{LinkEvent, PeerLink};
use crate::peer::reconnect::ReconnectSupervisor;
use crate::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Map of remote participant id to the single live link toward them
pub struct LinkRegistry {
    links: RwLock<HashMap<String, Arc<PeerLink>>>,
    candidates: PendingCandidates,
    config: RoomSessionConfig,
    source: Arc<SharedAudioSource>,
    playback: Arc<dyn PlaybackFactory>,
    supervisor: Arc<ReconnectSupervisor>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkRegistry {
    /// Create an empty registry
    pub fn new(
        config: RoomSessionConfig,
        source: Arc<SharedAudioSource>,
        playback: Arc<dyn PlaybackFactory>,
        supervisor: Arc<ReconnectSupervisor>,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            candidates: PendingCandidates::new(),
            config,
            source,
            playback,
            supervisor,
            event_tx,
        }
    }

    /// The pending candidate buffer shared with the dispatcher
    pub fn candidates(&self) -> &PendingCandidates {
        &self.candidates
    }

    /// Get the existing link for `remote_id`, or create one in the fresh
    /// state
    ///
    /// Idempotent: concurrent callers for the same peer all get the same
    /// link.
    pub async fn ensure_link(&self, remote_id: &str) -> Result<Arc<PeerLink>> {
        {
            let links = self.links.read().await;
            if let Some(link) = links.get(remote_id) {
                return Ok(Arc::clone(link));
            }
        }

        let mut links = self.links.write().await;
        // Re-check after taking the write lock; another task may have won
        if let Some(link) = links.get(remote_id) {
            return Ok(Arc::clone(link));
        }

        let link = PeerLink::new(
            remote_id.to_string(),
            &self.config,
            Arc::clone(&self.playback),
            self.event_tx.clone(),
        )
        .await?;

        links.insert(remote_id.to_string(), Arc::clone(&link));
        debug!(peer_id = %remote_id, total = links.len(), "Registered peer link");
        Ok(link)
    }

    /// Atomically replace the link for `remote_id` with a fresh one
    ///
    /// Used when yielding in a glare exchange and when rebuilding a failed
    /// link. The old link is closed before the new one becomes visible, so
    /// no window exists with two links for the same peer. Buffered
    /// candidates survive; they belong to the negotiation about to run.
    pub async fn replace_link(&self, remote_id: &str) -> Result<Arc<PeerLink>> {
        let mut links = self.links.write().await;

        if let Some(old) = links.remove(remote_id) {
            info!(
                peer_id = %remote_id,
                old_link_id = %old.link_id(),
                "Replacing peer link"
            );
            self.cleanup_link(&old).await;
        }

        let link = PeerLink::new(
            remote_id.to_string(),
            &self.config,
            Arc::clone(&self.playback),
            self.event_tx.clone(),
        )
        .await?;

        links.insert(remote_id.to_string(), Arc::clone(&link));
        Ok(link)
    }

    /// Remove and close the link for `remote_id`; idempotent
    ///
    /// Releases the shared audio source attach the link held, cancels its
    /// pending reconnect timer, and discards its buffered candidates. The
    /// retry budget survives; callers that mean "this peer is gone" follow
    /// up with [`ReconnectSupervisor::forget`].
    pub async fn remove(&self, remote_id: &str) {
        let removed = self.links.write().await.remove(remote_id);

        let Some(link) = removed else {
            return;
        };

        info!(peer_id = %remote_id, "Removing peer link");
        self.cleanup_link(&link).await;
        self.supervisor.cancel_timer(remote_id);
        self.candidates.discard(remote_id).await;
    }

    /// Remove and close every link (role switch, session teardown)
    pub async fn remove_all(&self) {
        let drained: Vec<(String, Arc<PeerLink>)> =
            self.links.write().await.drain().collect();

        join_all(drained.iter().map(|(_, link)| self.cleanup_link(link))).await;
        for (remote_id, _) in &drained {
            self.supervisor.forget(remote_id);
        }
        self.candidates.clear().await;
    }

    async fn cleanup_link(&self, link: &Arc<PeerLink>) {
        let held_source = link.local_track_attached();
        link.close().await;
        if held_source {
            self.source.release_for_link().await;
        }
    }

    /// The link for `remote_id`, if any
    pub async fn get(&self, remote_id: &str) -> Option<Arc<PeerLink>> {
        self.links.read().await.get(remote_id).cloned()
    }

    /// Snapshot of all live links
    pub async fn all(&self) -> Vec<Arc<PeerLink>> {
        self.links.read().await.values().cloned().collect()
    }

    /// Remote ids with a live link
    pub async fn peer_ids(&self) -> Vec<String> {
        self.links.read().await.keys().cloned().collect()
    }

    /// Number of live links
    pub async fn count(&self) -> usize {
        self.links.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::playback::DiscardPlaybackFactory;
    use crate::media::source::StaticOpusSource;
    use crate::peer::link::LinkState;

    fn registry() -> (Arc<LinkRegistry>, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = RoomSessionConfig::default();
        let source = Arc::new(SharedAudioSource::new(Arc::new(StaticOpusSource::new(
            "room-1",
        ))));
        let supervisor = Arc::new(ReconnectSupervisor::new(&config, tx.clone()));
        (
            Arc::new(LinkRegistry::new(
                config,
                source,
                Arc::new(DiscardPlaybackFactory),
                supervisor,
                tx,
            )),
            rx,
        )
    }

    #[tokio::test]
    async fn test_ensure_link_is_idempotent() {
        let (registry, _rx) = registry();

        let first = registry.ensure_link("peer-1").await.unwrap();
        let second = registry.ensure_link("peer-1").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.count().await, 1);

        registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_one_link_per_peer() {
        let (registry, _rx) = registry();

        registry.ensure_link("peer-1").await.unwrap();
        registry.ensure_link("peer-2").await.unwrap();
        assert_eq!(registry.count().await, 2);

        let mut ids = registry.peer_ids().await;
        ids.sort();
        assert_eq!(ids, vec!["peer-1", "peer-2"]);

        registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_replace_closes_old_link() {
        let (registry, _rx) = registry();

        let old = registry.ensure_link("peer-1").await.unwrap();
        let new = registry.replace_link("peer-1").await.unwrap();

        assert_ne!(old.link_id(), new.link_id());
        assert_eq!(old.state().await, LinkState::Closed);
        assert_eq!(new.state().await, LinkState::New);
        assert_eq!(registry.count().await, 1);

        registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_replace_keeps_buffered_candidates() {
        let (registry, _rx) = registry();

        registry.ensure_link("peer-1").await.unwrap();
        registry.candidates().push("peer-1", "c1".to_string()).await;

        registry.replace_link("peer-1").await.unwrap();
        assert_eq!(registry.candidates().len("peer-1").await, 1);

        registry.remove_all().await;
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_complete() {
        let (registry, _rx) = registry();

        let link = registry.ensure_link("peer-1").await.unwrap();
        registry.candidates().push("peer-1", "c1".to_string()).await;

        registry.remove("peer-1").await;
        assert_eq!(link.state().await, LinkState::Closed);
        assert!(registry.get("peer-1").await.is_none());
        assert_eq!(registry.candidates().len("peer-1").await, 0);

        registry.remove("peer-1").await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_releases_audio_source() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = RoomSessionConfig::default();
        let source = Arc::new(SharedAudioSource::new(Arc::new(StaticOpusSource::new(
            "room-1",
        ))));
        let supervisor = Arc::new(ReconnectSupervisor::new(&config, tx.clone()));
        let registry = LinkRegistry::new(
            config,
            Arc::clone(&source),
            Arc::new(DiscardPlaybackFactory),
            supervisor,
            tx,
        );

        let link = registry.ensure_link("peer-1").await.unwrap();
        let track = source.acquire_for_link().await.unwrap();
        link.attach_send_only(track).await.unwrap();
        assert_eq!(source.attach_count(), 1);

        registry.remove("peer-1").await;
        assert_eq!(source.attach_count(), 0);
        assert!(!source.is_live().await);
    }

    #[tokio::test]
    async fn test_remove_all_clears_everything() {
        let (registry, _rx) = registry();

        registry.ensure_link("peer-1").await.unwrap();
        registry.ensure_link("peer-2").await.unwrap();
        registry.candidates().push("peer-3", "c".to_string()).await;

        registry.remove_all().await;
        assert_eq!(registry.count().await, 0);
        assert!(registry.candidates().is_empty().await);
    }
}
