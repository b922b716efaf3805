//! Signaling boundary
//!
//! The relay transport (WebSocket, server push, whatever the embedding
//! application uses) stays outside this crate. Outbound events go through the
//! [`SignalingSink`] trait; inbound events are fed to the session's
//! dispatcher as [`SignalEvent`] values, in arrival order.

mod dispatcher;
pub mod protocol;

pub use dispatcher::SignalingDispatcher;
pub use protocol::SignalEvent;

use crate::Result;
use async_trait::async_trait;

/// Outbound half of the signaling relay
///
/// Implementations deliver events to the other members of the room. Delivery
/// is at-least-once and may be reordered; the engine tolerates both.
#[async_trait]
pub trait SignalingSink: Send + Sync {
    /// Send one event to the relay
    async fn send(&self, event: SignalEvent) -> Result<()>;
}
