//! Error types for session coordination

use thiserror::Error;

use crate::api::types::{ParticipantId, Role};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Role {role} is held by connected participant {holder}")]
    RoleConflict { role: Role, holder: ParticipantId },

    #[error("Participant {0} is not connected")]
    NotConnected(ParticipantId),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Chat message body is empty")]
    EmptyMessage,

    #[error("Sequence {requested} predates retained history (earliest retained: {earliest})")]
    SequenceGap { requested: u64, earliest: u64 },
}

pub type Result<T> = std::result::Result<T, SessionError>;
