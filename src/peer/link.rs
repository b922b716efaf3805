//! Peer link: one negotiated connection to one remote participant
//!
//! Wraps a `webrtc::RTCPeerConnection` behind an explicit negotiation state
//! machine. Exactly one offer/answer exchange may be in flight per link;
//! candidates that arrive too early are buffered by the registry, not here.

use crate::config::RoomSessionConfig;
use crate::media::playback::{PlaybackFactory, PlaybackHandle, TrackBinding};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Negotiation state of one peer link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link created, no description exchanged
    New,
    /// Local offer generated and sent
    Offering,
    /// Remote offer applied, local answer pending
    Answering,
    /// Descriptions exchanged, transport establishing a path
    Negotiating,
    /// Transport reports an established path
    Connected,
    /// Transport degraded after being connected; reconnect countdown running
    Poor,
    /// Transport failed or connect timeout elapsed
    Failed,
    /// Terminal; all resources released
    Closed,
}

/// Observed connection quality, visible to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkQuality {
    /// Path healthy
    Good,
    /// Path degraded or retries exhausted
    Poor,
}

/// Events emitted by links, timers, and the dispatcher toward the session
/// driver
#[derive(Debug)]
pub enum LinkEvent {
    /// Negotiation state changed
    StateChanged {
        /// Remote participant
        remote_id: String,
        /// Link instance that changed
        link_id: String,
        /// New state
        state: LinkState,
    },
    /// Local ICE candidate gathered; must be relayed to the peer
    LocalCandidate {
        /// Remote participant
        remote_id: String,
        /// Link instance that gathered it
        link_id: String,
        /// Candidate JSON (`RTCIceCandidateInit`)
        candidate: String,
    },
    /// A remote audio track was bound to playback
    RemoteTrackBound {
        /// Remote participant
        remote_id: String,
        /// Link instance it was bound on
        link_id: String,
    },
    /// Connect timeout elapsed without reaching `Connected`
    ConnectTimeout {
        /// Remote participant
        remote_id: String,
        /// Link instance that timed out
        link_id: String,
    },
    /// Listener-side verification window closed with no live inbound track
    NoAudio {
        /// Remote participant
        remote_id: String,
    },
    /// A reconnect timer fired and the link should be rebuilt if still
    /// unhealthy
    RelinkDue {
        /// Remote participant
        remote_id: String,
    },
    /// The room status changed to ended; tear the session down
    RoomEnded,
}

/// One bidirectional connection record to one remote participant
pub struct PeerLink {
    /// Remote participant id
    remote_id: String,

    /// Unique identifier for this link instance; a rebuilt link for the same
    /// peer gets a fresh id, which is what stale-completion guards compare
    link_id: String,

    /// Current negotiation state
    state: Arc<RwLock<LinkState>>,

    /// Observed connection quality
    quality: Arc<RwLock<LinkQuality>>,

    /// Underlying WebRTC peer connection
    pc: Arc<RTCPeerConnection>,

    /// Timestamp when the link was created
    created_at: Instant,

    /// Whether a remote description has been applied; gates direct candidate
    /// application versus buffering
    remote_description_set: Arc<AtomicBool>,

    /// Whether a local description has been sent; gates glare resolution
    local_description_sent: Arc<AtomicBool>,

    /// Whether the shared outbound track is attached to this link
    local_track_attached: AtomicBool,

    /// Whether a receive-only transceiver was declared
    recv_intent_declared: AtomicBool,

    /// Inbound track binding, present once a remote track arrived
    binding: Arc<RwLock<Option<TrackBinding>>>,

    /// Outbound RTP sender, retained so the track is not released early
    audio_sender: RwLock<Option<Arc<RTCRtpSender>>>,

    /// Connect-timeout watchdog
    watchdog: StdMutex<Option<JoinHandle<()>>>,

    /// Channel toward the session driver
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl PeerLink {
    /// Create a new peer link toward `remote_id`
    ///
    /// Builds the underlying `RTCPeerConnection` from the session config,
    /// wires transport callbacks, and starts the connect-timeout watchdog.
    pub async fn new(
        remote_id: String,
        config: &RoomSessionConfig,
        playback: Arc<dyn PlaybackFactory>,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<Self>> {
        let link_id = uuid::Uuid::new_v4().to_string();

        info!(peer_id = %remote_id, link_id = %link_id, "Creating peer link");

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtc(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| Error::WebRtc(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| {
                #[allow(clippy::needless_update)]
                RTCIceServer {
                    urls: vec![turn.url.clone()],
                    username: turn.username.clone(),
                    credential: turn.credential.clone(),
                    ..Default::default()
                }
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerConnection(format!("Failed to create peer connection: {}", e))
        })?);

        let link = Arc::new(Self {
            remote_id: remote_id.clone(),
            link_id: link_id.clone(),
            state: Arc::new(RwLock::new(LinkState::New)),
            quality: Arc::new(RwLock::new(LinkQuality::Good)),
            pc,
            created_at: Instant::now(),
            remote_description_set: Arc::new(AtomicBool::new(false)),
            local_description_sent: Arc::new(AtomicBool::new(false)),
            local_track_attached: AtomicBool::new(false),
            recv_intent_declared: AtomicBool::new(false),
            binding: Arc::new(RwLock::new(None)),
            audio_sender: RwLock::new(None),
            watchdog: StdMutex::new(None),
            event_tx,
        });

        link.wire_transport_callbacks(playback);
        link.start_watchdog(config.connect_timeout());

        Ok(link)
    }

    fn wire_transport_callbacks(self: &Arc<Self>, playback: Arc<dyn PlaybackFactory>) {
        // Transport state -> negotiation state
        let state = Arc::clone(&self.state);
        let quality = Arc::clone(&self.quality);
        let event_tx = self.event_tx.clone();
        let remote_id = self.remote_id.clone();
        let link_id = self.link_id.clone();

        self.pc.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let state = Arc::clone(&state);
                let quality = Arc::clone(&quality);
                let event_tx = event_tx.clone();
                let remote_id = remote_id.clone();
                let link_id = link_id.clone();

                Box::pin(async move {
                    let mut guard = state.write().await;
                    let current = *guard;
                    let next = match s {
                        RTCPeerConnectionState::Connected => {
                            *quality.write().await = LinkQuality::Good;
                            Some(LinkState::Connected)
                        }
                        RTCPeerConnectionState::Disconnected => {
                            // Degradation after being connected keeps the
                            // link open; the supervisor owns the countdown
                            if current == LinkState::Connected {
                                *quality.write().await = LinkQuality::Poor;
                                Some(LinkState::Poor)
                            } else {
                                None
                            }
                        }
                        RTCPeerConnectionState::Failed => {
                            if current != LinkState::Closed {
                                Some(LinkState::Failed)
                            } else {
                                None
                            }
                        }
                        RTCPeerConnectionState::Closed => {
                            if current != LinkState::Closed {
                                Some(LinkState::Closed)
                            } else {
                                None
                            }
                        }
                        _ => None,
                    };

                    if let Some(next) = next {
                        if current != next {
                            debug!(
                                peer_id = %remote_id,
                                "Link state transition: {:?} -> {:?}",
                                current, next
                            );
                            *guard = next;
                            let _ = event_tx.send(LinkEvent::StateChanged {
                                remote_id,
                                link_id,
                                state: next,
                            });
                        }
                    }
                })
            },
        ));

        // Gathered local candidates go out through the relay
        let event_tx = self.event_tx.clone();
        let remote_id = self.remote_id.clone();
        let link_id = self.link_id.clone();

        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let event_tx = event_tx.clone();
                let remote_id = remote_id.clone();
                let link_id = link_id.clone();

                Box::pin(async move {
                    let Some(candidate) = candidate else { return };
                    match candidate.to_json() {
                        Ok(init) => match serde_json::to_string(&init) {
                            Ok(json) => {
                                let _ = event_tx.send(LinkEvent::LocalCandidate {
                                    remote_id,
                                    link_id,
                                    candidate: json,
                                });
                            }
                            Err(e) => {
                                warn!(peer_id = %remote_id, "Failed to encode candidate: {}", e)
                            }
                        },
                        Err(e) => {
                            warn!(peer_id = %remote_id, "Failed to serialize candidate: {}", e)
                        }
                    }
                })
            }));

        // Remote audio tracks get bound to playback
        let binding = Arc::clone(&self.binding);
        let event_tx = self.event_tx.clone();
        let remote_id = self.remote_id.clone();
        let link_id = self.link_id.clone();

        self.pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let binding = Arc::clone(&binding);
            let playback = Arc::clone(&playback);
            let event_tx = event_tx.clone();
            let remote_id = remote_id.clone();
            let link_id = link_id.clone();

            Box::pin(async move {
                if track.kind() != RTPCodecType::Audio {
                    debug!(peer_id = %remote_id, "Ignoring non-audio remote track");
                    return;
                }
                match playback.bind(track).await {
                    Ok(handle) => {
                        *binding.write().await = Some(TrackBinding::new(handle));
                        let _ = event_tx.send(LinkEvent::RemoteTrackBound { remote_id, link_id });
                    }
                    Err(e) => {
                        warn!(peer_id = %remote_id, "Failed to bind remote track: {}", e);
                    }
                }
            })
        }));
    }

    fn start_watchdog(self: &Arc<Self>, timeout: std::time::Duration) {
        let state = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();
        let remote_id = self.remote_id.clone();
        let link_id = self.link_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let current = *state.read().await;
            if !matches!(current, LinkState::Connected | LinkState::Closed) {
                warn!(
                    peer_id = %remote_id,
                    "Connect timeout elapsed in state {:?}",
                    current
                );
                let _ = event_tx.send(LinkEvent::ConnectTimeout { remote_id, link_id });
            }
        });

        if let Ok(mut guard) = self.watchdog.lock() {
            *guard = Some(handle);
        }
    }

    /// Remote participant id
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Unique id of this link instance
    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    /// When the link was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Current negotiation state
    pub async fn state(&self) -> LinkState {
        *self.state.read().await
    }

    /// Current observed quality
    pub async fn quality(&self) -> LinkQuality {
        *self.quality.read().await
    }

    /// Mark the quality as degraded without closing the link or touching
    /// its negotiation state
    pub async fn mark_poor(&self) {
        *self.quality.write().await = LinkQuality::Poor;
    }

    /// Whether a remote description has been applied
    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set.load(Ordering::SeqCst)
    }

    /// Whether a local description has been sent (glare tie-break input)
    pub fn local_description_sent(&self) -> bool {
        self.local_description_sent.load(Ordering::SeqCst)
    }

    /// Whether the shared outbound track is attached
    pub fn local_track_attached(&self) -> bool {
        self.local_track_attached.load(Ordering::SeqCst)
    }

    /// Whether a receive-only intent was declared
    pub fn recv_intent_declared(&self) -> bool {
        self.recv_intent_declared.load(Ordering::SeqCst)
    }

    /// Whether an inbound remote track is bound
    pub async fn remote_track_bound(&self) -> bool {
        self.binding.read().await.is_some()
    }

    /// Playback handle of the bound inbound track, if any
    pub async fn playback(&self) -> Option<Arc<dyn PlaybackHandle>> {
        self.binding
            .read()
            .await
            .as_ref()
            .map(|b| Arc::clone(&b.playback))
    }

    /// Attach the shared outbound audio track with a send-only policy
    ///
    /// Must be called before any description is generated for this link so
    /// the track is included in it.
    pub async fn attach_send_only(&self, track: Arc<TrackLocalStaticSample>) -> Result<()> {
        if self.local_track_attached.load(Ordering::SeqCst) {
            return Ok(());
        }

        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Sendonly,
            send_encodings: vec![],
        };
        let transceiver = self
            .pc
            .add_transceiver_from_track(track as Arc<dyn TrackLocal + Send + Sync>, Some(init))
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to attach audio track: {}", e)))?;

        *self.audio_sender.write().await = Some(transceiver.sender().await);
        self.local_track_attached.store(true, Ordering::SeqCst);

        debug!(peer_id = %self.remote_id, "Outbound audio track attached send-only");
        Ok(())
    }

    /// Declare a receive-only audio intent (listener role)
    pub async fn declare_recv_only(&self) -> Result<()> {
        if self.recv_intent_declared.load(Ordering::SeqCst) {
            return Ok(());
        }

        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        };
        self.pc
            .add_transceiver_from_kind(RTPCodecType::Audio, Some(init))
            .await
            .map_err(|e| Error::MediaTrack(format!("Failed to declare receive intent: {}", e)))?;

        self.recv_intent_declared.store(true, Ordering::SeqCst);

        debug!(peer_id = %self.remote_id, "Receive-only audio intent declared");
        Ok(())
    }

    /// Generate and install the local offer
    ///
    /// Transitions `New -> Offering`. Track or receive intent must already be
    /// attached. Returns the SDP to relay to the peer.
    pub async fn begin_offer(&self) -> Result<String> {
        {
            let mut state = self.state.write().await;
            if *state != LinkState::New {
                return Err(Error::PeerConnection(format!(
                    "Offer rejected: negotiation already in flight for {} ({:?})",
                    self.remote_id, *state
                )));
            }
            *state = LinkState::Offering;
        }

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to create offer: {}", e)))?;

        self.pc
            .set_local_description(offer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set local description: {}", e)))?;

        let local_desc = self.pc.local_description().await.ok_or_else(|| {
            Error::Sdp("No local description after setting offer".to_string())
        })?;

        self.local_description_sent.store(true, Ordering::SeqCst);

        debug!(peer_id = %self.remote_id, "Created SDP offer");
        Ok(local_desc.sdp)
    }

    /// Apply an inbound remote offer
    ///
    /// Transitions `New -> Answering`. Also accepted while `Offering` when no
    /// local description has been sent yet; in that window the inbound offer
    /// wins without a full glare exchange.
    pub async fn apply_remote_offer(&self, sdp: String) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let acceptable = *state == LinkState::New
                || (*state == LinkState::Offering && !self.local_description_sent());
            if !acceptable {
                return Err(Error::Sdp(format!(
                    "Remote offer rejected in state {:?} for {}",
                    *state, self.remote_id
                )));
            }
            *state = LinkState::Answering;
        }

        let offer = RTCSessionDescription::offer(sdp)
            .map_err(|e| Error::Sdp(format!("Failed to parse offer: {}", e)))?;

        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set remote description: {}", e)))?;

        self.remote_description_set.store(true, Ordering::SeqCst);

        debug!(peer_id = %self.remote_id, "Applied remote offer");
        Ok(())
    }

    /// Generate and install the local answer
    ///
    /// Transitions `Answering -> Negotiating`. Returns the SDP to relay.
    pub async fn create_answer(&self) -> Result<String> {
        if self.state().await != LinkState::Answering {
            return Err(Error::Sdp(format!(
                "Answer without applied remote offer for {}",
                self.remote_id
            )));
        }

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to create answer: {}", e)))?;

        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set local description: {}", e)))?;

        let local_desc = self.pc.local_description().await.ok_or_else(|| {
            Error::Sdp("No local description after setting answer".to_string())
        })?;

        self.local_description_sent.store(true, Ordering::SeqCst);
        *self.state.write().await = LinkState::Negotiating;

        debug!(peer_id = %self.remote_id, "Created SDP answer");
        Ok(local_desc.sdp)
    }

    /// Apply an inbound remote answer
    ///
    /// Transitions `Offering -> Negotiating`.
    pub async fn apply_remote_answer(&self, sdp: String) -> Result<()> {
        if self.state().await != LinkState::Offering {
            return Err(Error::Sdp(format!(
                "Remote answer without pending offer for {}",
                self.remote_id
            )));
        }

        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::Sdp(format!("Failed to parse answer: {}", e)))?;

        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::Sdp(format!("Failed to set remote description: {}", e)))?;

        self.remote_description_set.store(true, Ordering::SeqCst);
        *self.state.write().await = LinkState::Negotiating;

        debug!(peer_id = %self.remote_id, "Applied remote answer");
        Ok(())
    }

    /// Apply one ICE candidate (JSON form of `RTCIceCandidateInit`)
    ///
    /// Callers must check [`has_remote_description`](Self::has_remote_description)
    /// first and buffer otherwise.
    pub async fn apply_candidate(&self, candidate: &str) -> Result<()> {
        let init: RTCIceCandidateInit = serde_json::from_str(candidate)
            .map_err(|e| Error::IceCandidate(format!("Failed to parse candidate: {}", e)))?;

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::IceCandidate(format!("Failed to add candidate: {}", e)))?;

        Ok(())
    }

    /// Close the link and release its resources; idempotent
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            if *state == LinkState::Closed {
                return;
            }
            *state = LinkState::Closed;
        }

        info!(peer_id = %self.remote_id, link_id = %self.link_id, "Closing peer link");

        if let Ok(mut guard) = self.watchdog.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }

        if let Some(binding) = self.binding.write().await.take() {
            binding.playback.close().await;
        }

        if let Err(e) = self.pc.close().await {
            warn!(peer_id = %self.remote_id, "Error closing peer connection: {}", e);
        }
    }

    #[cfg(test)]
    pub(crate) async fn force_state(&self, state: LinkState) {
        *self.state.write().await = state;
    }

    #[cfg(test)]
    pub(crate) async fn install_binding(&self, playback: Arc<dyn PlaybackHandle>) {
        *self.binding.write().await = Some(TrackBinding::new(playback));
    }
}
