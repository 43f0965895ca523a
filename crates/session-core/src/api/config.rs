//! Coordinator configuration

use std::time::Duration;

/// Tunables for the session coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a fully-disconnected session stays Live before the grace
    /// timer ends it.
    pub grace_period: Duration,
    /// Buffer size of the per-session broadcast channel. Slow subscribers
    /// that fall more than this far behind must resync.
    pub event_buffer: usize,
    /// Optional cap on retained chat history. When set, the log trims its
    /// head past this many messages and late resyncs fall back to a full
    /// replay from the earliest retained message.
    pub max_retained_messages: Option<usize>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
            event_buffer: 256,
            max_retained_messages: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    pub fn with_max_retained_messages(mut self, cap: usize) -> Self {
        self.max_retained_messages = Some(cap);
        self
    }
}
