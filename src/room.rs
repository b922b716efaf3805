//! Room domain types
//!
//! The local device's view of one audio room: who is in it, what role they
//! hold, and whether the room is live. Room lifecycle itself (create, start,
//! end, join) lives behind an external REST boundary; this module models the
//! snapshot that boundary returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Participant role within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Controls room lifecycle and publishes audio
    Host,
    /// Publishes audio
    Speaker,
    /// Receives audio only
    Listener,
}

impl Role {
    /// Whether this role attaches an outbound audio track to peer links
    pub fn publishes(&self) -> bool {
        matches!(self, Role::Host | Role::Speaker)
    }
}

/// Room lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Created but not yet started
    Scheduled,
    /// Broadcasting
    Live,
    /// Ended; terminal
    Ended,
}

/// One remote participant as known to the local session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier
    pub user_id: String,
    /// Current role
    pub role: Role,
}

/// Recording state as reported by the relay
///
/// Recording capture and upload are external; the session only tracks the
/// announced state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingState {
    /// Whether a recording is in progress
    pub is_recording: bool,
    /// Identifier of the active recording, if any
    pub recording_id: Option<String>,
}

/// Room snapshot returned by the external room-lifecycle API
///
/// Feeds the target-peer computation: the local session links to every other
/// speaker and listener in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room identifier
    pub room_id: String,
    /// Current lifecycle status
    pub status: RoomStatus,
    /// Host participant id
    pub host_id: String,
    /// Participants currently publishing
    pub speakers: Vec<String>,
    /// Participants currently listening
    pub listeners: Vec<String>,
}

impl RoomSnapshot {
    /// Compute the roster of remote participants from the local viewpoint,
    /// excluding `local_id`
    pub fn roster(&self, local_id: &str) -> HashMap<String, Role> {
        let mut roster = HashMap::new();
        for id in &self.speakers {
            if id != local_id {
                let role = if *id == self.host_id {
                    Role::Host
                } else {
                    Role::Speaker
                };
                roster.insert(id.clone(), role);
            }
        }
        for id in &self.listeners {
            if id != local_id {
                roster.insert(id.clone(), Role::Listener);
            }
        }
        roster
    }

    /// Speakers other than `local_id`, the health monitor's rebuild targets
    pub fn speaker_ids(&self, local_id: &str) -> Vec<String> {
        self.speakers
            .iter()
            .filter(|id| *id != local_id)
            .cloned()
            .collect()
    }

    /// Record a participant joining with the given role
    pub fn add_participant(&mut self, user_id: &str, role: Role) {
        self.remove_participant(user_id);
        match role {
            Role::Host | Role::Speaker => self.speakers.push(user_id.to_string()),
            Role::Listener => self.listeners.push(user_id.to_string()),
        }
    }

    /// Record a participant leaving
    pub fn remove_participant(&mut self, user_id: &str) {
        self.speakers.retain(|id| id != user_id);
        self.listeners.retain(|id| id != user_id);
    }
}
