//! Shared outbound audio source
//!
//! A publishing participant owns exactly one capture pipeline no matter how
//! many peer links fan out from it. The [`AudioSourceProvider`] trait is the
//! seam to the embedding application's capture stack; [`SharedAudioSource`]
//! adds the attach counting that keeps the pipeline alive until the last link
//! using it is gone.

use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Capture-side seam to the embedding application
///
/// `acquire` may fail when the platform denies capture; implementations
/// should return [`Error::MediaCapability`] with the relevant cause so the
/// engine can surface remediation hints instead of tearing links down.
#[async_trait]
pub trait AudioSourceProvider: Send + Sync {
    /// Get the outbound audio track, starting capture if needed
    ///
    /// Repeated calls while capture is running return the same track.
    async fn acquire(&self) -> Result<Arc<TrackLocalStaticSample>>;

    /// Whether capture is currently running
    async fn is_live(&self) -> bool;

    /// Stop capture and release the device
    async fn release(&self);
}

/// Attach-counted wrapper around one [`AudioSourceProvider`]
///
/// Each link that attaches the track takes a count; the provider is released
/// only when the count returns to zero, so removing one of several links
/// never silences the rest.
pub struct SharedAudioSource {
    provider: Arc<dyn AudioSourceProvider>,
    attach_count: AtomicUsize,
}

impl SharedAudioSource {
    /// Wrap a capture provider
    pub fn new(provider: Arc<dyn AudioSourceProvider>) -> Self {
        Self {
            provider,
            attach_count: AtomicUsize::new(0),
        }
    }

    /// Acquire the track for one link, taking an attach count
    pub async fn acquire_for_link(&self) -> Result<Arc<TrackLocalStaticSample>> {
        let track = self.provider.acquire().await?;
        let count = self.attach_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(attach_count = count, "Audio source acquired for link");
        Ok(track)
    }

    /// Validate that capture can start without taking an attach count
    ///
    /// Used before a role switch commits, so a capability failure leaves the
    /// session untouched. Capture started only for the probe is released
    /// again; a pipeline some link already holds keeps running.
    pub async fn probe(&self) -> Result<()> {
        self.provider.acquire().await?;
        if self.attach_count.load(Ordering::SeqCst) == 0 {
            self.provider.release().await;
        }
        Ok(())
    }

    /// Drop one link's attach count; releases the provider at zero
    pub async fn release_for_link(&self) {
        let previous = self
            .attach_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });

        match previous {
            Ok(1) => {
                info!("Last link detached; releasing audio source");
                self.provider.release().await;
            }
            Ok(count) => {
                debug!(attach_count = count - 1, "Audio source released for link");
            }
            Err(_) => {
                debug!("Audio source release with no attached links; ignoring");
            }
        }
    }

    /// Drop all attach counts and release the provider (session teardown)
    ///
    /// Releases unconditionally; capture may be running without an attached
    /// link, and `release` is idempotent on a stopped provider.
    pub async fn release_all(&self) {
        self.attach_count.swap(0, Ordering::SeqCst);
        self.provider.release().await;
    }

    /// Number of links currently holding the track
    pub fn attach_count(&self) -> usize {
        self.attach_count.load(Ordering::SeqCst)
    }

    /// Whether the underlying capture is running
    pub async fn is_live(&self) -> bool {
        self.provider.is_live().await
    }
}

/// Default provider producing a silent static Opus track
///
/// Real deployments implement [`AudioSourceProvider`] over their capture
/// stack and feed samples into the returned track; this one exists so the
/// engine can run headless and so tests have a concrete track to attach.
pub struct StaticOpusSource {
    stream_id: String,
    track: RwLock<Option<Arc<TrackLocalStaticSample>>>,
}

impl StaticOpusSource {
    /// Create a provider whose track belongs to `stream_id`
    pub fn new(stream_id: &str) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            track: RwLock::new(None),
        }
    }
}

#[async_trait]
impl AudioSourceProvider for StaticOpusSource {
    async fn acquire(&self) -> Result<Arc<TrackLocalStaticSample>> {
        let mut guard = self.track.write().await;
        if let Some(track) = guard.as_ref() {
            return Ok(Arc::clone(track));
        }

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            format!("audio-{}", uuid::Uuid::new_v4()),
            self.stream_id.clone(),
        ));

        *guard = Some(Arc::clone(&track));
        debug!(stream_id = %self.stream_id, "Created outbound Opus track");
        Ok(track)
    }

    async fn is_live(&self) -> bool {
        self.track.read().await.is_some()
    }

    async fn release(&self) {
        if self.track.write().await.take().is_some() {
            debug!(stream_id = %self.stream_id, "Released outbound Opus track");
        }
    }
}

/// Provider that always fails acquisition with a capability error
///
/// Stands in for platforms where capture is denied or missing.
pub struct UnavailableSource {
    cause: crate::error::CapabilityCause,
}

impl UnavailableSource {
    /// Create a provider failing with the given cause
    pub fn new(cause: crate::error::CapabilityCause) -> Self {
        Self { cause }
    }
}

#[async_trait]
impl AudioSourceProvider for UnavailableSource {
    async fn acquire(&self) -> Result<Arc<TrackLocalStaticSample>> {
        Err(Error::capability(self.cause))
    }

    async fn is_live(&self) -> bool {
        false
    }

    async fn release(&self) {}
}
