//! Runner module - the retry/polling engine.
//!
//! This module provides:
//! - classify: maps raw provider responses to retry verdicts
//! - DomainCycler: round-robin over placement domains
//! - Engine: run lifecycle and the attempt loop
//! - StatusSnapshot: polling view of the engine

mod classifier;
mod cycler;
mod engine;
mod snapshot;

pub use classifier::{MAX_DETAIL_CHARS, classify, truncate};
pub use cycler::{DomainCycler, DomainList};
pub use engine::{
    DEFAULT_ATTEMPT_HISTORY, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_RETRY_INTERVAL, Engine, EngineConfig, RunConfig,
};
pub use snapshot::StatusSnapshot;
