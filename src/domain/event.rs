//! Event records for the live run log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
    Success,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
            EventLevel::Success => "success",
        }
    }

    /// Level used when mirroring the event to the `log` facade.
    pub fn log_level(&self) -> log::Level {
        match self {
            EventLevel::Info | EventLevel::Success => log::Level::Info,
            EventLevel::Warn => log::Level::Warn,
            EventLevel::Error => log::Level::Error,
        }
    }
}

/// A timestamped, append-only entry in the event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Position in the event log (assigned on append, starts at 1)
    pub seq: u64,
    /// When the event was created
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: EventLevel,
    /// Human-readable message
    pub message: String,
}

impl Event {
    /// Create a new, not yet sequenced event
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Success, message)
    }

    /// Check if this event reports a terminal failure
    pub fn is_error(&self) -> bool {
        self.level == EventLevel::Error
    }
}
