//! ocihunt - keeps trying to create an OCI free-tier ARM instance
//!
//! A single retry run cycles through the configured availability domains,
//! classifies every provider answer, and stops on success, on a fatal error,
//! or on request. Progress is observable through a bounded event log, live
//! subscriptions, and status snapshots, locally or through the daemon socket.

pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod events;
pub mod ipc;
pub mod provider;
pub mod runner;
pub mod storage;

pub use error::{HuntError, Result};
