//! Role-based media attachment
//!
//! Decides, per the local participant's role, what each peer link carries:
//! publishing roles attach the one shared outbound track send-only,
//! listeners declare a receive-only intent. Either must happen before a
//! description is generated for the link, or the media section is missing
//! from it.

use crate::media::source::SharedAudioSource;
use crate::peer::link::PeerLink;
use crate::room::Role;
use crate::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Applies the local role's directional policy to peer links
pub struct RolePublisher {
    role: RwLock<Role>,
    source: Arc<SharedAudioSource>,
}

impl RolePublisher {
    /// Create a publisher for the given starting role
    pub fn new(role: Role, source: Arc<SharedAudioSource>) -> Self {
        Self {
            role: RwLock::new(role),
            source,
        }
    }

    /// Current local role
    pub async fn role(&self) -> Role {
        *self.role.read().await
    }

    /// Change the local role
    ///
    /// Only records the role; the session performs the full mesh rebuild
    /// that makes it effective.
    pub async fn set_role(&self, role: Role) {
        let mut guard = self.role.write().await;
        if *guard != role {
            debug!(from = ?*guard, to = ?role, "Local role changed");
            *guard = role;
        }
    }

    /// The shared audio source this publisher draws from
    pub fn source(&self) -> &Arc<SharedAudioSource> {
        &self.source
    }

    /// Attach role-appropriate media to `link`; idempotent per link
    ///
    /// Must run before the link generates any description. A capability
    /// failure from the capture side propagates so the caller can surface it
    /// instead of silently producing a silent link.
    pub async fn prepare(&self, link: &PeerLink) -> Result<()> {
        let role = self.role().await;

        if role.publishes() {
            if link.local_track_attached() {
                if !self.source.is_live().await {
                    // The track went away under an existing attachment. The
                    // rebuild path will re-acquire; flag it loudly here.
                    warn!(
                        peer_id = %link.remote_id(),
                        "Outbound audio source is no longer live under an attached link"
                    );
                }
                return Ok(());
            }

            let track = self.source.acquire_for_link().await?;
            if let Err(e) = link.attach_send_only(track).await {
                self.source.release_for_link().await;
                return Err(e);
            }
            Ok(())
        } else {
            link.declare_recv_only().await
        }
    }
}
