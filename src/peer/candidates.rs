//! Pending ICE candidate buffer
//!
//! Candidates can arrive over the relay before the offer or answer they
//! belong to. They are held here, per peer, in arrival order, and drained
//! exactly once immediately after the remote description is applied.
//! Candidates arriving after that point are applied directly and never enter
//! the buffer.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Per-peer FIFO of candidates awaiting a remote session description
#[derive(Default)]
pub struct PendingCandidates {
    buffers: RwLock<HashMap<String, Vec<String>>>,
}

impl PendingCandidates {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate for `remote_id`, preserving arrival order
    pub async fn push(&self, remote_id: &str, candidate: String) {
        let mut buffers = self.buffers.write().await;
        let queue = buffers.entry(remote_id.to_string()).or_default();
        queue.push(candidate);
        debug!(
            peer_id = %remote_id,
            buffered = queue.len(),
            "Buffered ICE candidate ahead of remote description"
        );
    }

    /// Take all buffered candidates for `remote_id`, in arrival order
    ///
    /// The buffer entry is removed; a second drain returns an empty list.
    pub async fn drain(&self, remote_id: &str) -> Vec<String> {
        self.buffers
            .write()
            .await
            .remove(remote_id)
            .unwrap_or_default()
    }

    /// Discard any buffered candidates for `remote_id`
    pub async fn discard(&self, remote_id: &str) {
        if self.buffers.write().await.remove(remote_id).is_some() {
            debug!(peer_id = %remote_id, "Discarded buffered ICE candidates");
        }
    }

    /// Discard everything (session teardown)
    pub async fn clear(&self) {
        self.buffers.write().await.clear();
    }

    /// Number of candidates currently buffered for `remote_id`
    pub async fn len(&self, remote_id: &str) -> usize {
        self.buffers
            .read()
            .await
            .get(remote_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Whether no candidates are buffered for any peer
    pub async fn is_empty(&self) -> bool {
        self.buffers.read().await.values().all(Vec::is_empty)
    }
}
