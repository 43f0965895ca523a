//! Session clock
//!
//! The elapsed time of a session is never ticked by a timer; it is derived
//! from the stored transition timestamps, so any number of readers can
//! recompute it concurrently and independently without drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authoritative elapsed-time source for one session
///
/// `started_at` and `ended_at` are each set at most once, on the Live and
/// Ended transitions respectively.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionClock {
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the Live transition. A second call is ignored.
    pub fn start(&mut self, at: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
    }

    /// Record the Ended transition. A second call is ignored.
    pub fn stop(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Elapsed whole seconds at `now`.
    ///
    /// `None` before the session has started; frozen at
    /// `ended_at - started_at` once stopped. Pure function of its inputs.
    pub fn elapsed_seconds_at(&self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.started_at?;
        let until = self.ended_at.unwrap_or(now);
        Some((until - started).num_seconds().max(0) as u64)
    }

    /// Elapsed whole seconds against the system clock.
    pub fn elapsed_seconds(&self) -> Option<u64> {
        self.elapsed_seconds_at(Utc::now())
    }
}
