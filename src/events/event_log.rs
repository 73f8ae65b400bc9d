//! Bounded in-memory event log with live fan-out.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::subscription::Subscription;
use crate::domain::Event;

/// Default number of events retained
pub const DEFAULT_LOG_CAPACITY: usize = 500;
/// Default per-subscriber backlog before the oldest events are dropped
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// A slice of the log returned to polling readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPage {
    /// Retained events with `seq > since`, oldest first
    pub events: Vec<Event>,
    /// Sequence number of the newest event ever appended
    pub latest_seq: u64,
}

struct LogInner {
    events: VecDeque<Event>,
    next_seq: u64,
}

/// Append-only log of run events.
///
/// Appends are mirrored to the `log` facade and pushed to every live
/// subscriber. A slow subscriber loses its oldest undelivered events; the
/// writer never waits on readers.
pub struct EventLog {
    inner: Mutex<LogInner>,
    capacity: usize,
    tx: broadcast::Sender<Event>,
}

impl EventLog {
    pub fn new(capacity: usize, subscriber_buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(subscriber_buffer.max(1));
        Self {
            inner: Mutex::new(LogInner {
                events: VecDeque::with_capacity(capacity.min(1024)),
                next_seq: 1,
            }),
            capacity: capacity.max(1),
            tx,
        }
    }

    /// Append an event, assigning its sequence number. Returns the stored copy.
    pub fn append(&self, mut event: Event) -> Event {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        event.seq = inner.next_seq;
        inner.next_seq += 1;

        ::log::log!(event.level.log_level(), "[{}] {}", event.level.as_str(), event.message);

        if inner.events.len() == self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(event.clone());

        // Sent under the lock so subscribers see events in seq order.
        // An error only means nobody is listening.
        let _ = self.tx.send(event.clone());
        event
    }

    /// Every retained event, oldest first
    pub fn history(&self) -> Vec<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.iter().cloned().collect()
    }

    /// Retained events newer than `since`
    pub fn since(&self, since: u64) -> LogPage {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        LogPage {
            events: inner.events.iter().filter(|e| e.seq > since).cloned().collect(),
            latest_seq: inner.next_seq - 1,
        }
    }

    pub fn last(&self) -> Option<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop retained events. Sequence numbers keep counting up so
    /// `since` cursors held by readers stay meaningful across runs.
    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).events.clear();
    }

    /// Live feed of events appended from now on
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER)
    }
}
