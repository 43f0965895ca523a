//! # reviewroom-session-core
//!
//! Server-side coordinator for live review sessions on a mentoring
//! platform. One session brings a student, an advisor and a reviewer into a
//! shared room with presence, per-participant media toggles, a shared
//! elapsed-time clock and a strictly ordered chat channel, kept consistent
//! across independently-reconnecting clients.
//!
//! The [`coordinator::SessionCoordinator`] is the single authority per
//! session: every mutation is validated against the session state machine,
//! applied, and fanned out as a [`events::SessionDelta`] to all subscribed
//! clients. Reconnecting clients recover exact state through
//! [`coordinator::SessionCoordinator::resync`], which pairs a presence
//! snapshot with a chat replay in one response.
//!
//! ```no_run
//! use reviewroom_session_core::api::{CoordinatorConfig, ParticipantId, Role};
//! use reviewroom_session_core::coordinator::SessionCoordinator;
//!
//! # async fn run() -> reviewroom_session_core::errors::Result<()> {
//! let coordinator = SessionCoordinator::new(CoordinatorConfig::default());
//! let session = coordinator.create_session();
//!
//! let deltas = coordinator.subscribe(&session)?;
//! coordinator.join(&session, ParticipantId::from("alice"), Role::Student).await?;
//! coordinator.send_chat(&session, &ParticipantId::from("alice"), "hello").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod archive;
pub mod chat;
pub mod clock;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod registry;
pub mod session;

pub use api::{
    ChatMessage, ConnectionState, CoordinatorConfig, EndReason, MediaField, MediaState,
    ParticipantId, ParticipantInfo, PresenceSnapshot, ResyncResponse, Role, SessionId,
    SessionState,
};
pub use coordinator::SessionCoordinator;
pub use errors::{Result, SessionError};
pub use events::SessionDelta;
