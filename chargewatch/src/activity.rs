//! Bounded in-memory activity log.
//!
//! Every component that does something operationally interesting appends a
//! one-line message here: webhook received, signature rejected, alert sent,
//! delivery failed, unhandled event type. The log is volatile (reset on
//! restart), capacity-bounded, and purely observational - it is never used as
//! an error-reporting channel.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of entries retained; the oldest is evicted on overflow.
pub const LOG_CAPACITY: usize = 50;

/// Number of entries returned by the "recent" view.
pub const RECENT_LIMIT: usize = 20;

/// A single timestamped activity message.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Capacity-bounded FIFO of recent operational events.
///
/// Appends are serialized by an internal mutex so concurrent request handlers
/// can't lose entries or corrupt the eviction order. The critical section is
/// a push/pop on a `VecDeque`, so contention is negligible.
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a message, evicting the oldest entry if the log is full.
    pub fn append(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(activity = %message, "Activity log entry");

        let mut entries = self.entries.lock().expect("activity log mutex poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            timestamp: Utc::now(),
            message,
        });
    }

    /// Snapshot of all retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().expect("activity log mutex poisoned");
        entries.iter().cloned().collect()
    }

    /// The newest `limit` entries (oldest first) plus the total retained count.
    pub fn recent(&self, limit: usize) -> (Vec<LogEntry>, usize) {
        let entries = self.entries.lock().expect("activity log mutex poisoned");
        let total = entries.len();
        let skip = total.saturating_sub(limit);
        (entries.iter().skip(skip).cloned().collect(), total)
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}
