//! Client-side session mirror
//!
//! A read-only replica of one session's server-owned state, updated by
//! applying broadcast deltas. The transport is best-effort and
//! at-least-once, so the mirror must absorb duplicates and reordering:
//! presence and media deltas are last-write-wins by authority revision,
//! while chat deltas are applied strictly in sequence order, buffering
//! out-of-order arrivals until the gap closes. `SessionEnded` is terminal.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use reviewroom_session_core::api::types::{
    ChatMessage, ConnectionState, MediaField, ParticipantId, ParticipantInfo, ResyncResponse,
    Role, SessionId, SessionState,
};
use reviewroom_session_core::events::SessionDelta;

/// Per-participant field addressed by a delta, for last-write-wins tracking
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
enum FieldKey {
    Connection,
    Media(MediaField),
}

/// What the mirror did with one delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The delta changed mirror state.
    Accepted,
    /// Out-of-order chat delta, parked until the gap closes.
    Buffered,
    /// Duplicate or stale delta, discarded.
    Discarded,
}

/// Read-only replica of one session, fed by deltas
#[derive(Debug)]
pub struct SessionMirror {
    session_id: SessionId,
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    participants: HashMap<ParticipantId, ParticipantInfo>,
    /// Deltas at or below this revision are already reflected by the
    /// bootstrap snapshot.
    baseline_revision: u64,
    /// Highest revision applied per participant field.
    field_revisions: HashMap<(ParticipantId, FieldKey), u64>,
    messages: Vec<ChatMessage>,
    /// Next chat sequence number the mirror can accept in order.
    next_seq: u64,
    /// Out-of-order chat deltas waiting for the gap to close.
    pending: BTreeMap<u64, ChatMessage>,
}

impl SessionMirror {
    /// Bootstrap a mirror from a resync response.
    pub fn from_resync(response: ResyncResponse) -> Self {
        let snapshot = response.snapshot;
        let participants = snapshot
            .participants
            .into_iter()
            .map(|info| (info.id.clone(), info))
            .collect();
        Self {
            session_id: snapshot.session_id,
            state: snapshot.state,
            started_at: snapshot.started_at,
            ended_at: snapshot.ended_at,
            participants,
            baseline_revision: snapshot.revision,
            field_revisions: HashMap::new(),
            messages: response.messages,
            next_seq: snapshot.latest_seq + 1,
            pending: BTreeMap::new(),
        }
    }

    /// Fold a later resync into an existing mirror, e.g. after the
    /// subscriber lagged past the broadcast buffer.
    pub fn apply_resync(&mut self, response: ResyncResponse) {
        let snapshot = response.snapshot;
        self.state = snapshot.state;
        self.started_at = snapshot.started_at;
        self.ended_at = snapshot.ended_at;
        self.participants = snapshot
            .participants
            .into_iter()
            .map(|info| (info.id.clone(), info))
            .collect();
        self.baseline_revision = snapshot.revision;
        self.field_revisions.clear();

        if response.full_replay {
            // Local history predates retained history; start over.
            self.messages = response.messages;
        } else {
            for message in response.messages {
                if message.seq >= self.next_seq {
                    self.messages.push(message);
                }
            }
        }
        self.next_seq = snapshot.latest_seq + 1;
        let next_seq = self.next_seq;
        self.pending.retain(|seq, _| *seq >= next_seq);
    }

    /// Apply one broadcast delta.
    pub fn apply(&mut self, delta: SessionDelta) -> Applied {
        if delta.session_id() != &self.session_id {
            return Applied::Discarded;
        }
        // A terminated session accepts nothing further.
        if self.state == SessionState::Ended {
            return Applied::Discarded;
        }

        match delta {
            SessionDelta::PresenceUpdate { participant_id, role, connection, revision, .. } => {
                self.apply_presence(participant_id, role, connection, revision)
            }
            SessionDelta::MediaUpdate { participant_id, field, value, revision, .. } => {
                self.apply_media(participant_id, field, value, revision)
            }
            SessionDelta::ChatMessage { message, .. } => self.apply_chat(message),
            SessionDelta::SessionEnded { ended_at, .. } => {
                self.state = SessionState::Ended;
                self.ended_at = Some(ended_at);
                // Participant lifecycle ends with the session.
                self.participants.clear();
                self.field_revisions.clear();
                Applied::Accepted
            }
        }
    }

    fn is_stale(&mut self, participant: &ParticipantId, key: FieldKey, revision: u64) -> bool {
        if revision <= self.baseline_revision {
            return true;
        }
        let entry = self
            .field_revisions
            .entry((participant.clone(), key))
            .or_insert(0);
        if revision <= *entry {
            return true;
        }
        *entry = revision;
        false
    }

    fn apply_presence(
        &mut self,
        participant_id: ParticipantId,
        role: Role,
        connection: ConnectionState,
        revision: u64,
    ) -> Applied {
        if self.is_stale(&participant_id, FieldKey::Connection, revision) {
            return Applied::Discarded;
        }

        match self.participants.get_mut(&participant_id) {
            Some(info) => info.connection = connection,
            None => {
                // A new identity claiming a role slot displaces any
                // previous (necessarily disconnected) holder.
                self.participants.retain(|_, info| info.role != role);
                self.participants.insert(
                    participant_id.clone(),
                    ParticipantInfo {
                        id: participant_id,
                        role,
                        connection,
                        media: Default::default(),
                    },
                );
            }
        }
        Applied::Accepted
    }

    fn apply_media(
        &mut self,
        participant_id: ParticipantId,
        field: MediaField,
        value: bool,
        revision: u64,
    ) -> Applied {
        if self.is_stale(&participant_id, FieldKey::Media(field), revision) {
            return Applied::Discarded;
        }
        match self.participants.get_mut(&participant_id) {
            Some(info) => {
                info.media.set(field, value);
                Applied::Accepted
            }
            None => {
                // Media for an unknown participant: the presence delta has
                // not arrived yet. Dropping is safe, a resync recovers it.
                tracing::debug!(
                    "Dropping media delta for unknown participant {}",
                    participant_id
                );
                Applied::Discarded
            }
        }
    }

    fn apply_chat(&mut self, message: ChatMessage) -> Applied {
        if message.seq < self.next_seq {
            return Applied::Discarded;
        }
        let buffered = message.seq > self.next_seq;
        self.pending.insert(message.seq, message);
        // Drain every message that is now contiguous.
        while let Some(message) = self.pending.remove(&self.next_seq) {
            self.messages.push(message);
            self.next_seq += 1;
        }
        if buffered && !self.pending.is_empty() {
            Applied::Buffered
        } else {
            Applied::Accepted
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    /// Whether the client may still submit mutations to the coordinator.
    pub fn can_mutate(&self) -> bool {
        self.state != SessionState::Ended
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&ParticipantInfo> {
        self.participants.get(id)
    }

    /// Participants ordered by role for stable rendering.
    pub fn participants(&self) -> Vec<&ParticipantInfo> {
        let mut infos: Vec<&ParticipantInfo> = self.participants.values().collect();
        infos.sort_by_key(|info| match info.role {
            Role::Student => 0,
            Role::Advisor => 1,
            Role::Reviewer => 2,
        });
        infos
    }

    /// Chat history applied so far, in sequence order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Highest chat sequence applied contiguously; what this client reports
    /// as `last_known_seq` when it resyncs.
    pub fn last_contiguous_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// True when buffered chat deltas are waiting on a gap. A persistent
    /// gap means a delta was lost and the client should resync.
    pub fn has_chat_gap(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Elapsed session seconds at `now`, recomputed locally from the
    /// authoritative timestamps; no synchronized tick required.
    pub fn elapsed_seconds_at(&self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.started_at?;
        let until = self.ended_at.unwrap_or(now);
        Some((until - started).num_seconds().max(0) as u64)
    }

    pub fn elapsed_seconds(&self) -> Option<u64> {
        self.elapsed_seconds_at(Utc::now())
    }
}
