//! Event log & broadcaster.
//!
//! The engine is the only writer. Readers either poll the retained history
//! or hold a `Subscription` for the live feed.

mod event_log;
mod subscription;

pub use event_log::{DEFAULT_LOG_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER, EventLog, LogPage};
pub use subscription::Subscription;
