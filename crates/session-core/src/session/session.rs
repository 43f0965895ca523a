//! Session state machine
//!
//! Owns the lifecycle of one session and gates every mutation. Composes the
//! leaf components: clock, participant registry and chat log. The caller
//! (the coordinator) serializes access; this type itself is single-threaded
//! state behind the coordinator's lock.

use chrono::{DateTime, Utc};

use crate::api::types::{
    ChatMessage, ConnectionState, EndReason, MediaField, ParticipantId, PresenceSnapshot, Role,
    SessionId, SessionState,
};
use crate::archive::SessionArchive;
use crate::chat::ChatLog;
use crate::clock::SessionClock;
use crate::errors::{Result, SessionError};
use crate::events::SessionDelta;
use crate::registry::ParticipantRegistry;

/// Effect of an accepted join
#[derive(Debug)]
pub struct JoinEffect {
    pub delta: SessionDelta,
    /// True when this was the first successful join and the session
    /// transitioned Pending -> Live.
    pub went_live: bool,
    /// True when the joiner reconnected an existing registration.
    pub reconnected: bool,
}

/// Effect of an accepted leave
#[derive(Debug)]
pub struct LeaveEffect {
    pub delta: SessionDelta,
    /// True when nobody is left connected and the grace timer must start.
    pub start_grace: bool,
}

/// Effect of the Live -> Ended transition
#[derive(Debug)]
pub struct EndEffect {
    pub delta: SessionDelta,
    pub archive: SessionArchive,
}

/// Canonical state of one live review session
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    clock: SessionClock,
    registry: ParticipantRegistry,
    chat: ChatLog,
    created_at: DateTime<Utc>,
    end_reason: Option<EndReason>,
}

impl Session {
    pub fn new(id: SessionId, max_retained_messages: Option<usize>) -> Self {
        Self {
            id,
            state: SessionState::Pending,
            clock: SessionClock::new(),
            registry: ParticipantRegistry::new(),
            chat: ChatLog::new(max_retained_messages),
            created_at: Utc::now(),
            end_reason: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(SessionError::SessionClosed);
        }
        Ok(())
    }

    /// Register or reconnect a participant. The first successful join flips
    /// the session Live and starts the clock.
    pub fn join(&mut self, id: ParticipantId, role: Role, now: DateTime<Utc>) -> Result<JoinEffect> {
        self.ensure_open()?;
        let outcome = self.registry.join(id.clone(), role)?;

        let went_live = if self.state == SessionState::Pending {
            self.state = SessionState::Live;
            self.clock.start(now);
            tracing::info!("Session {} is live, started by {} ({})", self.id, id, role);
            true
        } else {
            false
        };

        let delta = SessionDelta::PresenceUpdate {
            session_id: self.id.clone(),
            participant_id: id,
            role,
            connection: ConnectionState::Connected,
            revision: outcome.revision,
        };
        Ok(JoinEffect { delta, went_live, reconnected: outcome.reconnected })
    }

    /// Mark a participant disconnected. The session stays Live; when the
    /// last connected participant leaves, the caller starts the grace timer.
    pub fn leave(&mut self, id: &ParticipantId, _now: DateTime<Utc>) -> Result<LeaveEffect> {
        self.ensure_open()?;
        let role = self
            .registry
            .get(id)
            .ok_or_else(|| SessionError::NotConnected(id.clone()))?
            .role;
        let revision = self.registry.disconnect(id)?;
        let start_grace = self.registry.connected_count() == 0;

        tracing::debug!(
            "Participant {} disconnected from session {} (grace: {})",
            id,
            self.id,
            start_grace
        );

        let delta = SessionDelta::PresenceUpdate {
            session_id: self.id.clone(),
            participant_id: id.clone(),
            role,
            connection: ConnectionState::Disconnected,
            revision,
        };
        Ok(LeaveEffect { delta, start_grace })
    }

    /// Transition to Ended. Returns `None` when the session already ended;
    /// the operation is idempotent, not an error.
    pub fn end(&mut self, reason: EndReason, now: DateTime<Utc>) -> Option<EndEffect> {
        if self.state == SessionState::Ended {
            return None;
        }
        self.state = SessionState::Ended;
        self.clock.stop(now);
        self.end_reason = Some(reason.clone());

        let archive = SessionArchive {
            session_id: self.id.clone(),
            started_at: self.clock.started_at(),
            ended_at: now,
            reason: reason.clone(),
            participants: self.registry.snapshot(),
            messages: self.chat.replay_all(),
        };

        // Participant lifecycle is bound to the session lifecycle.
        self.registry.clear();

        tracing::info!("Session {} ended ({:?})", self.id, reason);

        let delta = SessionDelta::SessionEnded {
            session_id: self.id.clone(),
            reason,
            ended_at: now,
        };
        Some(EndEffect { delta, archive })
    }

    /// Flip one media toggle for a connected participant of a live session.
    pub fn set_media(
        &mut self,
        id: &ParticipantId,
        field: MediaField,
        value: bool,
    ) -> Result<SessionDelta> {
        self.ensure_open()?;
        if self.state != SessionState::Live {
            return Err(SessionError::NotConnected(id.clone()));
        }
        let (_, revision) = self.registry.set_media(id, field, value)?;
        Ok(SessionDelta::MediaUpdate {
            session_id: self.id.clone(),
            participant_id: id.clone(),
            field,
            value,
            revision,
        })
    }

    /// Append a chat message. Only valid while Live; the sender must be a
    /// connected participant.
    pub fn append_chat(
        &mut self,
        sender: &ParticipantId,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        if self.state != SessionState::Live {
            return Err(SessionError::SessionClosed);
        }
        match self.registry.get(sender) {
            Some(p) if p.connection == ConnectionState::Connected => {}
            _ => return Err(SessionError::NotConnected(sender.clone())),
        }
        self.chat.append(sender.clone(), body, now)
    }

    /// Full current registry state plus the counters a client needs to
    /// apply subsequent deltas consistently.
    pub fn presence_snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot {
            session_id: self.id.clone(),
            state: self.state,
            started_at: self.clock.started_at(),
            ended_at: self.clock.ended_at(),
            participants: self.registry.snapshot(),
            revision: self.registry.revision(),
            latest_seq: self.chat.latest_seq(),
        }
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn connected_count(&self) -> usize {
        self.registry.connected_count()
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    /// Elapsed whole seconds at `now`; `None` while Pending.
    pub fn elapsed_seconds_at(&self, now: DateTime<Utc>) -> Option<u64> {
        self.clock.elapsed_seconds_at(now)
    }
}
