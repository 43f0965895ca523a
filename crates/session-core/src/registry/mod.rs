//! Participant registry
//!
//! Tracks identity, role slot, connection state and media toggles per
//! participant. Every accepted mutation bumps a per-session revision
//! counter; deltas carry the revision so clients can apply them
//! last-write-wins per field and discard stale arrivals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::api::types::{ConnectionState, MediaField, MediaState, ParticipantId, ParticipantInfo, Role};
use crate::errors::{Result, SessionError};

/// One registered participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
    pub connection: ConnectionState,
    pub media: MediaState,
}

impl Participant {
    fn new(id: ParticipantId, role: Role) -> Self {
        Self {
            id,
            role,
            connection: ConnectionState::Connected,
            media: MediaState::default(),
        }
    }

    pub fn to_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id.clone(),
            role: self.role,
            connection: self.connection,
            media: self.media,
        }
    }
}

/// Result of an accepted join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// True when the identity was already registered and reconnected.
    pub reconnected: bool,
    /// A disconnected previous holder of the role slot that this join
    /// displaced, if any.
    pub displaced: Option<ParticipantId>,
    pub revision: u64,
}

/// Registry of the participants of one session
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
    /// Role slot assignments. Exactly one holder per role.
    roles: HashMap<Role, ParticipantId>,
    revision: u64,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Register a new participant or reconnect a known one.
    ///
    /// Fails with `RoleConflict` when the role slot is held by a different
    /// identity that is still connected, or when a known identity tries to
    /// come back under a different role. A disconnected holder is displaced
    /// by a new identity claiming the slot.
    pub fn join(&mut self, id: ParticipantId, role: Role) -> Result<JoinOutcome> {
        if let Some(existing) = self.participants.get_mut(&id) {
            // Role is immutable after the first join.
            if existing.role != role {
                let holder = self.roles.get(&role).cloned().unwrap_or_else(|| id.clone());
                return Err(SessionError::RoleConflict { role, holder });
            }
            existing.connection = ConnectionState::Connected;
            let revision = self.bump();
            return Ok(JoinOutcome { reconnected: true, displaced: None, revision });
        }

        let displaced = match self.roles.get(&role).cloned() {
            Some(holder_id) => {
                let holder_connected = self
                    .participants
                    .get(&holder_id)
                    .map(|p| p.connection == ConnectionState::Connected)
                    .unwrap_or(false);
                if holder_connected {
                    return Err(SessionError::RoleConflict { role, holder: holder_id });
                }
                self.participants.remove(&holder_id);
                Some(holder_id)
            }
            None => None,
        };

        self.roles.insert(role, id.clone());
        self.participants.insert(id.clone(), Participant::new(id, role));
        let revision = self.bump();
        Ok(JoinOutcome { reconnected: false, displaced, revision })
    }

    /// Mark a participant disconnected. The role slot stays assigned so a
    /// reconnect within the grace period finds it unchanged.
    pub fn disconnect(&mut self, id: &ParticipantId) -> Result<u64> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| SessionError::NotConnected(id.clone()))?;
        participant.connection = ConnectionState::Disconnected;
        Ok(self.bump())
    }

    /// Flip one media toggle. Valid only for a connected participant.
    pub fn set_media(
        &mut self,
        id: &ParticipantId,
        field: MediaField,
        value: bool,
    ) -> Result<(MediaState, u64)> {
        let participant = self
            .participants
            .get_mut(id)
            .ok_or_else(|| SessionError::NotConnected(id.clone()))?;
        if participant.connection != ConnectionState::Connected {
            return Err(SessionError::NotConnected(id.clone()));
        }
        participant.media.set(field, value);
        let media = participant.media;
        Ok((media, self.bump()))
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn connected_count(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.connection == ConnectionState::Connected)
            .count()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Full current registry state, ordered by role for stable output.
    pub fn snapshot(&self) -> Vec<ParticipantInfo> {
        let mut infos: Vec<ParticipantInfo> =
            self.participants.values().map(Participant::to_info).collect();
        infos.sort_by_key(|info| match info.role {
            Role::Student => 0,
            Role::Advisor => 1,
            Role::Reviewer => 2,
        });
        infos
    }

    /// Drop all participants. Called when the session ends; participant
    /// lifecycle is bound to session lifecycle.
    pub fn clear(&mut self) {
        self.participants.clear();
        self.roles.clear();
    }
}
