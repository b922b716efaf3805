//! Error types for the room session engine

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why acquiring the local audio source failed.
///
/// Capability errors are terminal for the local participant's attempt to take
/// a publishing role; they are surfaced to the user with a remediation hint
/// and never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityCause {
    /// The user denied microphone access
    PermissionDenied,
    /// The capture device is claimed by another application
    DeviceBusy,
    /// Capture is unavailable in the current (insecure) execution context
    InsecureContext,
    /// The platform has no usable capture support
    Unsupported,
}

impl CapabilityCause {
    /// User-facing remediation hint for this cause
    pub fn remediation(&self) -> &'static str {
        match self {
            CapabilityCause::PermissionDenied => {
                "Grant microphone permission and try joining as a speaker again"
            }
            CapabilityCause::DeviceBusy => {
                "Close other applications using the microphone, then retry"
            }
            CapabilityCause::InsecureContext => {
                "Audio capture requires a secure context; reconnect over a trusted channel"
            }
            CapabilityCause::Unsupported => {
                "This device has no supported audio capture; you can still join as a listener"
            }
        }
    }
}

impl std::fmt::Display for CapabilityCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CapabilityCause::PermissionDenied => "microphone permission denied",
            CapabilityCause::DeviceBusy => "capture device busy",
            CapabilityCause::InsecureContext => "insecure execution context",
            CapabilityCause::Unsupported => "audio capture unsupported",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in room session operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling delivery error
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// No peer link registered for the given participant
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// WebRTC peer connection error
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// SDP negotiation error (malformed or rejected description)
    #[error("SDP negotiation error: {0}")]
    Sdp(String),

    /// ICE candidate error (malformed or rejected candidate)
    #[error("ICE candidate error: {0}")]
    IceCandidate(String),

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrack(String),

    /// Local audio source unavailable
    #[error("Audio capture unavailable: {cause}")]
    MediaCapability {
        /// The specific capability failure
        cause: CapabilityCause,
    },

    /// Operation attempted on a session that was already torn down
    #[error("Room session is closed")]
    SessionClosed,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Capability error constructor
    pub fn capability(cause: CapabilityCause) -> Self {
        Error::MediaCapability { cause }
    }

    /// Check if this error is a capability error (terminal for the
    /// publishing-role attempt, never retried automatically)
    pub fn is_capability(&self) -> bool {
        matches!(self, Error::MediaCapability { .. })
    }

    /// Check if this error is a negotiation error (tears down one link,
    /// recovery delegated to the reconnection supervisor)
    pub fn is_negotiation(&self) -> bool {
        matches!(self, Error::Sdp(_) | Error::IceCandidate(_))
    }

    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("test".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: test");

        let err = Error::capability(CapabilityCause::DeviceBusy);
        assert_eq!(err.to_string(), "Audio capture unavailable: capture device busy");
    }

    #[test]
    fn test_error_is_capability() {
        assert!(Error::capability(CapabilityCause::PermissionDenied).is_capability());
        assert!(!Error::Sdp("bad".to_string()).is_capability());
    }

    #[test]
    fn test_error_is_negotiation() {
        assert!(Error::Sdp("bad offer".to_string()).is_negotiation());
        assert!(Error::IceCandidate("bad candidate".to_string()).is_negotiation());
        assert!(!Error::Signaling("down".to_string()).is_negotiation());
    }

    #[test]
    fn test_remediation_is_specific() {
        let causes = [
            CapabilityCause::PermissionDenied,
            CapabilityCause::DeviceBusy,
            CapabilityCause::InsecureContext,
            CapabilityCause::Unsupported,
        ];
        for cause in &causes {
            assert!(!cause.remediation().is_empty());
        }
        assert_ne!(
            CapabilityCause::DeviceBusy.remediation(),
            CapabilityCause::PermissionDenied.remediation()
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
