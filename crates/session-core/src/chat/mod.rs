//! Append-only chat log
//!
//! Messages are totally ordered by the sequence number assigned on append,
//! not by wall-clock time. History replay is the `since` iterator; the log
//! may trim its head under a retention cap, in which case a replay request
//! that predates retained history reports a gap and the caller falls back
//! to a full replay from the earliest retained message.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::api::types::{ChatMessage, ParticipantId};
use crate::errors::{Result, SessionError};

/// Strictly ordered, append-only message sequence for one session
#[derive(Debug)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    next_seq: u64,
    /// Sequence number of the oldest message still held. Advances past 1
    /// only when a retention cap trims the head.
    earliest_retained: u64,
    max_retained: Option<usize>,
}

impl ChatLog {
    pub fn new(max_retained: Option<usize>) -> Self {
        Self {
            messages: VecDeque::new(),
            next_seq: 1,
            earliest_retained: 1,
            max_retained,
        }
    }

    /// Append a message, assigning the next sequence number and stamping
    /// server time. The body is stored trimmed.
    pub fn append(
        &mut self,
        sender: ParticipantId,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        let body = body.trim();
        if body.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let message = ChatMessage {
            seq: self.next_seq,
            sender,
            body: body.to_string(),
            sent_at: at,
        };
        self.next_seq += 1;
        self.messages.push_back(message.clone());
        self.enforce_cap();
        Ok(message)
    }

    /// Messages with sequence number greater than `seq`, ascending.
    ///
    /// Lazy and restartable; yields nothing when `seq` is at or past the
    /// latest assigned sequence. Trimmed history is silently absent — use
    /// [`ChatLog::replay_from`] when the caller must detect that.
    pub fn since(&self, seq: u64) -> impl Iterator<Item = &ChatMessage> + '_ {
        // Messages are contiguous, so the offset into the deque is direct.
        let skip = seq.saturating_sub(self.earliest_retained - 1) as usize;
        self.messages.iter().skip(skip)
    }

    /// Like `since`, but errors with `SequenceGap` when messages after
    /// `seq` have already been trimmed away.
    pub fn replay_from(&self, seq: u64) -> Result<Vec<ChatMessage>> {
        if seq + 1 < self.earliest_retained {
            return Err(SessionError::SequenceGap {
                requested: seq,
                earliest: self.earliest_retained,
            });
        }
        Ok(self.since(seq).cloned().collect())
    }

    /// Every retained message, ascending.
    pub fn replay_all(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Highest sequence number assigned so far (0 before the first append).
    pub fn latest_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn earliest_retained(&self) -> u64 {
        self.earliest_retained
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    fn enforce_cap(&mut self) {
        if let Some(cap) = self.max_retained {
            while self.messages.len() > cap {
                self.messages.pop_front();
                self.earliest_retained += 1;
            }
        }
    }
}
