//! Public API surface: shared types and configuration

pub mod config;
pub mod types;

pub use config::CoordinatorConfig;
pub use types::{
    ChatMessage, ConnectionState, EndReason, MediaField, MediaState, ParticipantId,
    ParticipantInfo, PresenceSnapshot, ResyncResponse, Role, SessionId, SessionState,
};
