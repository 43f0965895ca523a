//! Core SessionCoordinator structure and operations
//!
//! One coordinator owns the canonical state of every live review session on
//! this node. Each session is a `DashMap` entry; all mutations of one
//! session serialize on its `RwLock` and the resulting delta is pushed
//! through the session's broadcast channel before the lock is released, so
//! chat sequence numbers, registry revisions and snapshots are mutually
//! consistent at the instant a delta is emitted. Sessions never contend
//! with each other.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::api::config::CoordinatorConfig;
use crate::api::types::{
    ChatMessage, EndReason, MediaField, ParticipantId, PresenceSnapshot, ResyncResponse, Role,
    SessionId, SessionState,
};
use crate::archive::{SessionArchive, SessionArchiver};
use crate::errors::{Result, SessionError};
use crate::events::{DeltaBroadcaster, SessionDelta};
use crate::session::Session;

/// Pending grace timer bookkeeping for one session
#[derive(Debug, Default)]
struct GraceSlot {
    task: Option<tokio::task::AbortHandle>,
    /// Bumped on every (re)schedule and every cancel; a fired timer whose
    /// generation no longer matches is stale and does nothing.
    generation: u64,
}

/// One session's entry: state behind the serialization lock, plus its
/// broadcast endpoint and grace timer slot.
///
/// Lock order is always session -> grace.
#[derive(Debug)]
struct SessionHandle {
    session: RwLock<Session>,
    broadcaster: DeltaBroadcaster,
    grace: Mutex<GraceSlot>,
}

/// The server-side authority for live review sessions
pub struct SessionCoordinator {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    config: CoordinatorConfig,
    archiver: Option<Arc<dyn SessionArchiver>>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("sessions", &self.sessions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl SessionCoordinator {
    pub fn new(config: CoordinatorConfig) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            config,
            archiver: None,
        })
    }

    pub fn with_archiver(
        config: CoordinatorConfig,
        archiver: Arc<dyn SessionArchiver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            config,
            archiver: Some(archiver),
        })
    }

    /// Register a new Pending session with a generated id.
    pub fn create_session(&self) -> SessionId {
        let id = SessionId::new();
        // A fresh uuid cannot collide with an existing entry.
        let _ = self.create_session_with_id(id.clone());
        id
    }

    /// Register a new Pending session under a caller-chosen id.
    pub fn create_session_with_id(&self, id: SessionId) -> Result<()> {
        if self.sessions.contains_key(&id) {
            return Err(SessionError::SessionExists(id.to_string()));
        }
        let handle = SessionHandle {
            session: RwLock::new(Session::new(id.clone(), self.config.max_retained_messages)),
            broadcaster: DeltaBroadcaster::new(self.config.event_buffer),
            grace: Mutex::new(GraceSlot::default()),
        };
        self.sessions.insert(id.clone(), Arc::new(handle));
        tracing::info!("Created session {}", id);
        Ok(())
    }

    fn handle(&self, id: &SessionId) -> Result<Arc<SessionHandle>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
    }

    /// Join a participant to a session, or reconnect a known identity.
    ///
    /// The first successful join transitions the session Pending -> Live.
    /// Any successful join cancels a pending grace timer.
    pub async fn join(
        self: &Arc<Self>,
        session_id: &SessionId,
        participant_id: ParticipantId,
        role: Role,
    ) -> Result<SessionDelta> {
        let handle = self.handle(session_id)?;
        let mut session = handle.session.write().await;
        let effect = session.join(participant_id.clone(), role, Utc::now())?;
        handle.broadcaster.publish(effect.delta.clone());

        // Reconnection within the grace period keeps the session alive.
        let mut slot = handle.grace.lock().await;
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
            tracing::debug!("Grace timer cancelled for session {} by {} joining", session_id, participant_id);
        }

        Ok(effect.delta)
    }

    /// Mark a participant disconnected. When nobody remains connected the
    /// grace timer starts; if it fires before anyone reconnects, the
    /// session ends.
    pub async fn leave(
        self: &Arc<Self>,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> Result<SessionDelta> {
        let handle = self.handle(session_id)?;
        let mut session = handle.session.write().await;
        let effect = session.leave(participant_id, Utc::now())?;
        handle.broadcaster.publish(effect.delta.clone());

        if effect.start_grace {
            let mut slot = handle.grace.lock().await;
            slot.generation += 1;
            if let Some(task) = slot.task.take() {
                task.abort();
            }
            let generation = slot.generation;
            let this = Arc::clone(self);
            let sid = session_id.clone();
            let grace_period = self.config.grace_period;
            let task = tokio::spawn(async move {
                tokio::time::sleep(grace_period).await;
                this.expire_grace(sid, generation).await;
            });
            slot.task = Some(task.abort_handle());
            tracing::debug!(
                "Grace timer started for session {} ({:?})",
                session_id,
                self.config.grace_period
            );
        }

        Ok(effect.delta)
    }

    /// Force the session to Ended. Idempotent: ending an already-Ended
    /// session is a no-op, not an error.
    pub async fn end_session(
        &self,
        session_id: &SessionId,
        initiator: &ParticipantId,
    ) -> Result<()> {
        let handle = self.handle(session_id)?;
        let mut session = handle.session.write().await;
        if session.state() == SessionState::Ended {
            return Ok(());
        }
        if session.registry().get(initiator).is_none() {
            return Err(SessionError::NotConnected(initiator.clone()));
        }

        let reason = EndReason::Ended { by: initiator.clone() };
        if let Some(effect) = session.end(reason, Utc::now()) {
            handle.broadcaster.publish(effect.delta);
            self.spawn_archive(effect.archive);
        }

        let mut slot = handle.grace.lock().await;
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        Ok(())
    }

    /// Flip one media toggle for a connected participant of a live session.
    pub async fn set_media(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
        field: MediaField,
        value: bool,
    ) -> Result<SessionDelta> {
        let handle = self.handle(session_id)?;
        let mut session = handle.session.write().await;
        let delta = session.set_media(participant_id, field, value)?;
        handle.broadcaster.publish(delta.clone());
        Ok(delta)
    }

    /// Append a chat message and broadcast it. Returns the message with its
    /// authority-assigned sequence number and server timestamp.
    pub async fn send_chat(
        &self,
        session_id: &SessionId,
        sender: &ParticipantId,
        body: &str,
    ) -> Result<ChatMessage> {
        let handle = self.handle(session_id)?;
        let mut session = handle.session.write().await;
        let message = session.append_chat(sender, body, Utc::now())?;
        handle.broadcaster.publish(SessionDelta::ChatMessage {
            session_id: session_id.clone(),
            message: message.clone(),
        });
        Ok(message)
    }

    /// Full current registry state. Never blocks behind mutations beyond
    /// the point-in-time read.
    pub async fn presence_snapshot(&self, session_id: &SessionId) -> Result<PresenceSnapshot> {
        let handle = self.handle(session_id)?;
        let session = handle.session.read().await;
        Ok(session.presence_snapshot())
    }

    /// Messages with sequence number greater than `seq`, ascending.
    pub async fn chat_since(&self, session_id: &SessionId, seq: u64) -> Result<Vec<ChatMessage>> {
        let handle = self.handle(session_id)?;
        let session = handle.session.read().await;
        Ok(session.chat().since(seq).cloned().collect())
    }

    /// Combined snapshot + chat replay for a reconnecting or late-joining
    /// client.
    ///
    /// When `last_known_seq` predates retained history the response falls
    /// back to a full replay from the earliest retained message instead of
    /// failing; `full_replay` tells the client to discard local history.
    pub async fn resync(
        &self,
        session_id: &SessionId,
        last_known_seq: u64,
    ) -> Result<ResyncResponse> {
        let handle = self.handle(session_id)?;
        let session = handle.session.read().await;
        let snapshot = session.presence_snapshot();
        let (messages, full_replay) = match session.chat().replay_from(last_known_seq) {
            Ok(messages) => (messages, false),
            Err(SessionError::SequenceGap { requested, earliest }) => {
                tracing::warn!(
                    "Resync of session {} from seq {} predates retained history (earliest {}), replaying in full",
                    session_id,
                    requested,
                    earliest
                );
                (session.chat().replay_all(), true)
            }
            Err(e) => return Err(e),
        };
        Ok(ResyncResponse { snapshot, messages, full_replay })
    }

    /// Subscribe to a session's delta stream.
    pub fn subscribe(&self, session_id: &SessionId) -> Result<broadcast::Receiver<SessionDelta>> {
        let handle = self.handle(session_id)?;
        Ok(handle.broadcaster.subscribe())
    }

    /// Elapsed whole seconds of the session clock; `None` while Pending,
    /// frozen once Ended.
    pub async fn elapsed_seconds(&self, session_id: &SessionId) -> Result<Option<u64>> {
        let handle = self.handle(session_id)?;
        let session = handle.session.read().await;
        Ok(session.elapsed_seconds_at(Utc::now()))
    }

    pub async fn session_state(&self, session_id: &SessionId) -> Result<SessionState> {
        let handle = self.handle(session_id)?;
        let session = handle.session.read().await;
        Ok(session.state())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Grace timer body: ends the session only if the timer is still the
    /// latest scheduled one and nobody reconnected meanwhile.
    async fn expire_grace(self: Arc<Self>, session_id: SessionId, generation: u64) {
        let Ok(handle) = self.handle(&session_id) else {
            return;
        };
        let mut session = handle.session.write().await;
        {
            let slot = handle.grace.lock().await;
            if slot.generation != generation {
                return;
            }
        }
        if session.state() != SessionState::Live || session.connected_count() > 0 {
            return;
        }

        tracing::info!("Grace period expired for session {}, ending", session_id);
        if let Some(effect) = session.end(EndReason::GraceExpired, Utc::now()) {
            handle.broadcaster.publish(effect.delta);
            self.spawn_archive(effect.archive);
        }
    }

    /// Hand the final record to the archiver off the mutation path.
    fn spawn_archive(&self, record: SessionArchive) {
        if let Some(archiver) = &self.archiver {
            let archiver = Arc::clone(archiver);
            tokio::spawn(async move {
                archiver.archive(record).await;
            });
        }
    }
}
