//! Media plumbing
//!
//! Outbound capture behind [`AudioSourceProvider`](source::AudioSourceProvider),
//! inbound playback behind [`PlaybackFactory`](playback::PlaybackFactory),
//! role policy in [`RolePublisher`](publisher::RolePublisher), and the
//! listener-side [`AudioHealthMonitor`](health::AudioHealthMonitor) sweep.

pub mod health;
pub mod playback;
pub mod publisher;
pub mod source;

pub use health::AudioHealthMonitor;
pub use playback::{
    DiscardPlayback, DiscardPlaybackFactory, PlaybackFactory, PlaybackHandle, TrackBinding,
};
pub use publisher::RolePublisher;
pub use source::{AudioSourceProvider, SharedAudioSource, StaticOpusSource, UnavailableSource};
