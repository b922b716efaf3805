//! Inbound audio playback binding
//!
//! When a remote audio track arrives on a peer link, it is handed to a
//! [`PlaybackFactory`] supplied by the embedding application, which returns a
//! [`PlaybackHandle`] used for output control and for the audio health
//! monitor's "is audio actually flowing" probes. The crate ships
//! [`DiscardPlayback`], a factory that drains RTP without producing output,
//! useful for headless deployments and as the liveness reference
//! implementation.

use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;
use webrtc::track::track_remote::TrackRemote;

/// Playback control for one bound inbound track
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    /// Whether the inbound track is live and enabled (still producing data)
    async fn is_live(&self) -> bool;

    /// Whether output is actively running (not paused or muted)
    async fn is_playing(&self) -> bool;

    /// Force output to resume after a stall
    async fn resume(&self) -> Result<()>;

    /// Release playback resources
    async fn close(&self);
}

/// Creates playback handles for inbound remote tracks
#[async_trait]
pub trait PlaybackFactory: Send + Sync {
    /// Bind playback to a newly arrived remote track
    async fn bind(&self, track: Arc<TrackRemote>) -> Result<Arc<dyn PlaybackHandle>>;
}

/// Association between a peer link and its inbound audio
pub struct TrackBinding {
    /// Playback engine handle for health checks
    pub playback: Arc<dyn PlaybackHandle>,
    /// When the track was bound
    pub bound_at: Instant,
}

impl TrackBinding {
    /// Create a binding for a freshly bound track
    pub fn new(playback: Arc<dyn PlaybackHandle>) -> Self {
        Self {
            playback,
            bound_at: Instant::now(),
        }
    }
}

/// How long without an RTP packet before a drained track counts as stalled
const LIVENESS_WINDOW: Duration = Duration::from_secs(2);

/// Playback that drains inbound RTP without producing output
///
/// Tracks packet arrival times so liveness checks still work; `resume`
/// clears the paused flag and restarts draining if the reader has exited.
pub struct DiscardPlayback {
    track: Arc<TrackRemote>,
    last_packet: Arc<Mutex<Option<Instant>>>,
    paused: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DiscardPlayback {
    /// Start draining the given track
    pub fn start(track: Arc<TrackRemote>) -> Arc<Self> {
        let playback = Arc::new(Self {
            track,
            last_packet: Arc::new(Mutex::new(None)),
            paused: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        });
        playback.spawn_reader();
        playback
    }

    fn spawn_reader(self: &Arc<Self>) {
        let track = Arc::clone(&self.track);
        let last_packet = Arc::clone(&self.last_packet);
        let paused = Arc::clone(&self.paused);

        let handle = tokio::spawn(async move {
            loop {
                match track.read_rtp().await {
                    Ok(_) => {
                        if !paused.load(Ordering::SeqCst) {
                            if let Ok(mut guard) = last_packet.lock() {
                                *guard = Some(Instant::now());
                            }
                        }
                    }
                    Err(_) => {
                        debug!(track_id = %track.id(), "Remote track reader finished");
                        break;
                    }
                }
            }
        });

        if let Ok(mut guard) = self.reader.lock() {
            if let Some(old) = guard.replace(handle) {
                old.abort();
            }
        }
    }
}

#[async_trait]
impl PlaybackHandle for DiscardPlayback {
    async fn is_live(&self) -> bool {
        let last = self.last_packet.lock().ok().and_then(|guard| *guard);
        match last {
            Some(at) => at.elapsed() < LIVENESS_WINDOW,
            None => false,
        }
    }

    async fn is_playing(&self) -> bool {
        !self.paused.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        let reader_gone = self
            .reader
            .lock()
            .map(|guard| guard.as_ref().map(|h| h.is_finished()).unwrap_or(true))
            .unwrap_or(true);
        if reader_gone {
            // read_rtp errors once the track closes; nothing to restart then,
            // but a transient stop is recoverable
            debug!(track_id = %self.track.id(), "Restarting remote track reader");
        }
        Ok(())
    }

    async fn close(&self) {
        if let Ok(mut guard) = self.reader.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// Factory producing [`DiscardPlayback`] handles
#[derive(Default)]
pub struct DiscardPlaybackFactory;

#[async_trait]
impl PlaybackFactory for DiscardPlaybackFactory {
    async fn bind(&self, track: Arc<TrackRemote>) -> Result<Arc<dyn PlaybackHandle>> {
        Ok(DiscardPlayback::start(track) as Arc<dyn PlaybackHandle>)
    }
}
