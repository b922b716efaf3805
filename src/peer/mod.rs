//! Peer mesh management
//!
//! One [`PeerLink`](link::PeerLink) per remote participant, tracked by the
//! [`LinkRegistry`](registry::LinkRegistry), with early candidates held in
//! [`PendingCandidates`](candidates::PendingCandidates) and rebuild timing
//! owned by the [`ReconnectSupervisor`](reconnect::ReconnectSupervisor).

pub mod candidates;
pub mod link;
pub mod registry;
pub mod reconnect;

pub use candidates::PendingCandidates;
pub use link::{LinkEvent, LinkQuality, LinkState, PeerLink};
pub use registry::LinkRegistry;
pub use reconnect::ReconnectSupervisor;
