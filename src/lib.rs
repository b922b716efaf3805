//! Peer-link orchestration for live multi-party audio rooms
//!
//! This crate manages the WebRTC peer mesh for one participant's device in
//! one audio room: connection lifecycle, signaling sequencing, ICE-candidate
//! buffering, role-based track publishing, reconnection, and audio-health
//! verification.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Signaling relay (external, at-least-once delivery)  │
//! │  ↕ SignalEvent / SignalingSink                       │
//! │  RoomSession                                         │
//! │  ├─ SignalingDispatcher (routes relay events)        │
//! │  ├─ LinkRegistry (one PeerLink per remote peer)      │
//! │  │   └─ PendingCandidates (early-candidate buffer)   │
//! │  ├─ RolePublisher (send-only / recv-only policy)     │
//! │  ├─ ReconnectSupervisor (degrade + retry timers)     │
//! │  └─ AudioHealthMonitor (listener-side sweeps)        │
//! │     ↓                                                │
//! │  webrtc::RTCPeerConnection (mesh, no media server)   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Media capture and playback stay behind the
//! [`AudioSourceProvider`](media::AudioSourceProvider) and
//! [`PlaybackFactory`](media::PlaybackFactory) seams; room lifecycle (create,
//! start, end) lives behind an external API that hands the session its
//! [`RoomSnapshot`](room::RoomSnapshot).
//!
//! # Example
//!
//! ```
//! use voicemesh::RoomSessionConfig;
//!
//! let config = RoomSessionConfig::default()
//!     .with_connect_timeout_secs(15)
//!     .with_health_check_interval_secs(5);
//!
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod room;
pub mod session;
pub mod signaling;

pub use config::{RoomSessionConfig, TurnServerConfig};
pub use error::{CapabilityCause, Error, Result};
pub use media::{
    AudioSourceProvider, DiscardPlaybackFactory, PlaybackFactory, PlaybackHandle, StaticOpusSource,
};
pub use peer::{LinkQuality, LinkState};
pub use room::{Participant, RecordingState, Role, RoomSnapshot, RoomStatus};
pub use session::RoomSession;
pub use signaling::{SignalEvent, SignalingSink};
