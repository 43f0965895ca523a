//! Core types shared by the coordinator and its clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session ID type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Participant ID type
///
/// Identity comes from the external auth collaborator; the coordinator never
/// mints participant ids itself.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Participant role within a session
///
/// Exactly one slot per role per session; a participant's role never changes
/// after the first successful join.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Advisor,
    Reviewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Advisor => write!(f, "advisor"),
            Role::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// Session lifecycle state
///
/// Transitions are one-directional: Pending -> Live -> Ended. No state is
/// re-enterable.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    Pending,
    Live,
    Ended,
}

/// Connection state of a participant
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Per-participant media toggles
///
/// The coordinator only tracks on/off state; media bytes travel over an
/// external transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaState {
    pub mic: bool,
    pub camera: bool,
    pub screen_share: bool,
}

impl MediaState {
    pub fn get(&self, field: MediaField) -> bool {
        match field {
            MediaField::Mic => self.mic,
            MediaField::Camera => self.camera,
            MediaField::ScreenShare => self.screen_share,
        }
    }

    pub fn set(&mut self, field: MediaField, value: bool) {
        match field {
            MediaField::Mic => self.mic = value,
            MediaField::Camera => self.camera = value,
            MediaField::ScreenShare => self.screen_share = value,
        }
    }
}

/// Addressable media toggle fields
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum MediaField {
    Mic,
    Camera,
    ScreenShare,
}

impl std::fmt::Display for MediaField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaField::Mic => write!(f, "mic"),
            MediaField::Camera => write!(f, "camera"),
            MediaField::ScreenShare => write!(f, "screen_share"),
        }
    }
}

/// One chat message, immutable once appended
///
/// `seq` is assigned by the authority and is the total order; `sent_at` is
/// server time and display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub seq: u64,
    pub sender: ParticipantId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Public view of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub role: Role,
    pub connection: ConnectionState,
    pub media: MediaState,
}

/// Full point-in-time registry state, used to bootstrap or resync a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub participants: Vec<ParticipantInfo>,
    /// Revision counter at snapshot time; deltas at or below this revision
    /// are already reflected in the snapshot.
    pub revision: u64,
    /// Highest chat sequence number assigned at snapshot time.
    pub latest_seq: u64,
}

/// Combined snapshot + chat replay handed to a reconnecting client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncResponse {
    pub snapshot: PresenceSnapshot,
    /// Messages after the client's last known sequence, ascending.
    pub messages: Vec<ChatMessage>,
    /// True when the client's last known sequence predated retained history
    /// and the replay restarts from the earliest retained message. The
    /// client must discard its local chat history before applying.
    pub full_replay: bool,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// A participant ended the session explicitly.
    Ended { by: ParticipantId },
    /// Every participant disconnected and the grace period elapsed.
    GraceExpired,
}
