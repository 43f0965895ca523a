//! Session delta broadcast
//!
//! Fan-out of state deltas to subscribed clients over
//! `tokio::sync::broadcast`. Delivery is best-effort: a slow subscriber that
//! overruns the channel buffer observes a lag error on its receiver and
//! recovers through `resync`; nothing here ever blocks the authority or
//! surfaces to the initiator of a mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::api::types::{
    ChatMessage, ConnectionState, EndReason, MediaField, ParticipantId, Role, SessionId,
};

/// A minimal description of one state change, pushed to clients
///
/// Presence and media deltas carry the authority-assigned revision and are
/// last-write-wins per field; chat deltas carry the authoritative sequence
/// number and must be applied in sequence order; `SessionEnded` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionDelta {
    PresenceUpdate {
        session_id: SessionId,
        participant_id: ParticipantId,
        role: Role,
        connection: ConnectionState,
        revision: u64,
    },
    MediaUpdate {
        session_id: SessionId,
        participant_id: ParticipantId,
        field: MediaField,
        value: bool,
        revision: u64,
    },
    ChatMessage {
        session_id: SessionId,
        message: ChatMessage,
    },
    SessionEnded {
        session_id: SessionId,
        reason: EndReason,
        ended_at: DateTime<Utc>,
    },
}

impl SessionDelta {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SessionDelta::PresenceUpdate { session_id, .. } => session_id,
            SessionDelta::MediaUpdate { session_id, .. } => session_id,
            SessionDelta::ChatMessage { session_id, .. } => session_id,
            SessionDelta::SessionEnded { session_id, .. } => session_id,
        }
    }
}

/// Per-session broadcast endpoint
#[derive(Debug)]
pub struct DeltaBroadcaster {
    sender: broadcast::Sender<SessionDelta>,
}

impl DeltaBroadcaster {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    /// Subscribe to this session's delta stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionDelta> {
        self.sender.subscribe()
    }

    /// Push a delta to every current subscriber.
    ///
    /// A send with no live receivers is not an error; the delta is simply
    /// dropped and a late subscriber bootstraps from `resync` instead.
    pub fn publish(&self, delta: SessionDelta) {
        match self.sender.send(delta) {
            Ok(receivers) => {
                tracing::trace!("Broadcast delta to {} receiver(s)", receivers);
            }
            Err(_) => {
                tracing::trace!("No subscribers for delta, dropped");
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
