//! Relay signaling protocol types
//!
//! All events are scoped by room id and delivered by an external relay that
//! guarantees at-least-once, possibly reordered delivery. The engine ignores
//! events originating from the local participant.

use crate::room::{Role, RoomStatus};
use serde::{Deserialize, Serialize};

/// One signaling event, inbound or outbound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SignalEvent {
    /// Peer announces availability for linking
    Ready {
        /// Room scope
        room_id: String,
        /// Originating participant
        from_id: String,
        /// Addressed participant
        target_id: String,
    },

    /// SDP offer
    Offer {
        /// Room scope
        room_id: String,
        /// Originating participant
        from_id: String,
        /// Addressed participant
        target_id: String,
        /// SDP offer body
        sdp: String,
    },

    /// SDP answer
    Answer {
        /// Room scope
        room_id: String,
        /// Originating participant
        from_id: String,
        /// Addressed participant
        target_id: String,
        /// SDP answer body
        sdp: String,
    },

    /// ICE candidate, serialized as the JSON form of an
    /// `RTCIceCandidateInit`
    Candidate {
        /// Room scope
        room_id: String,
        /// Originating participant
        from_id: String,
        /// Addressed participant
        target_id: String,
        /// Candidate JSON
        candidate: String,
    },

    /// A participant joined the room
    ParticipantJoined {
        /// Room scope
        room_id: String,
        /// Joining participant
        user_id: String,
        /// Their role
        role: Role,
    },

    /// A participant left the room
    ParticipantLeft {
        /// Room scope
        room_id: String,
        /// Leaving participant
        user_id: String,
    },

    /// Room lifecycle status changed
    RoomStatusChanged {
        /// Room scope
        room_id: String,
        /// New status
        status: RoomStatus,
    },

    /// Recording state changed
    RecordingStatus {
        /// Room scope
        room_id: String,
        /// Whether a recording is in progress
        is_recording: bool,
        /// Identifier of the active recording, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        recording_id: Option<String>,
    },
}

impl SignalEvent {
    /// Room id this event is scoped to
    pub fn room_id(&self) -> &str {
        match self {
            SignalEvent::Ready { room_id, .. }
            | SignalEvent::Offer { room_id, .. }
            | SignalEvent::Answer { room_id, .. }
            | SignalEvent::Candidate { room_id, .. }
            | SignalEvent::ParticipantJoined { room_id, .. }
            | SignalEvent::ParticipantLeft { room_id, .. }
            | SignalEvent::RoomStatusChanged { room_id, .. }
            | SignalEvent::RecordingStatus { room_id, .. } => room_id,
        }
    }

    /// Originating participant, for peer-addressed events
    pub fn from_id(&self) -> Option<&str> {
        match self {
            SignalEvent::Ready { from_id, .. }
            | SignalEvent::Offer { from_id, .. }
            | SignalEvent::Answer { from_id, .. }
            | SignalEvent::Candidate { from_id, .. } => Some(from_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_names() {
        let ev = SignalEvent::Ready {
            room_id: "r".to_string(),
            from_id: "a".to_string(),
            target_id: "b".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"event\":\"ready\""));

        let ev = SignalEvent::ParticipantLeft {
            room_id: "r".to_string(),
            user_id: "a".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"event\":\"participant-left\""));
    }

    #[test]
    fn test_offer_round_trip() {
        let ev = SignalEvent::Offer {
            room_id: "r".to_string(),
            from_id: "a".to_string(),
            target_id: "b".to_string(),
            sdp: "v=0\r\n".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: SignalEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn test_recording_status_omits_absent_id() {
        let ev = SignalEvent::RecordingStatus {
            room_id: "r".to_string(),
            is_recording: false,
            recording_id: None,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(!json.contains("recording_id"));
    }

    #[test]
    fn test_from_id_accessor() {
        let ev = SignalEvent::Candidate {
            room_id: "r".to_string(),
            from_id: "a".to_string(),
            target_id: "b".to_string(),
            candidate: "{}".to_string(),
        };
        assert_eq!(ev.from_id(), Some("a"));
        assert_eq!(ev.room_id(), "r");

        let ev = SignalEvent::RoomStatusChanged {
            room_id: "r".to_string(),
            status: crate::room::RoomStatus::Live,
        };
        assert_eq!(ev.from_id(), None);
    }
}
