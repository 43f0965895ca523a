//! Post-session archival seam
//!
//! After a session ends, the coordinator hands the final record to an
//! archiver collaborator on a spawned task. Archival is fire-and-forget and
//! never sits on the mutation path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::types::{ChatMessage, EndReason, ParticipantInfo, SessionId};

/// Final record of one ended session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionArchive {
    pub session_id: SessionId,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub reason: EndReason,
    /// Registry state at the instant the session ended.
    pub participants: Vec<ParticipantInfo>,
    pub messages: Vec<ChatMessage>,
}

/// Collaborator that persists ended sessions
#[async_trait]
pub trait SessionArchiver: Send + Sync {
    async fn archive(&self, record: SessionArchive);
}

/// Archiver that drops every record, for deployments without persistence
#[derive(Debug, Default)]
pub struct NullArchiver;

#[async_trait]
impl SessionArchiver for NullArchiver {
    async fn archive(&self, record: SessionArchive) {
        tracing::debug!("Discarding archive for session {}", record.session_id);
    }
}
