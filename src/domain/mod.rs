//! Domain types for ocihunt
//!
//! - RunState: lifecycle of the single retry run
//! - DomainId / Attempt: one provider call against a placement domain
//! - Outcome: classified verdict for an attempt
//! - Event: entries of the live run log
//! - ResultRecord: durable output of a successful run

pub mod attempt;
pub mod event;
pub mod outcome;
pub mod record;
pub mod run_state;

pub use attempt::{Attempt, DomainId};
pub use event::{Event, EventLevel};
pub use outcome::{LaunchedInstance, Outcome};
pub use record::{ResultRecord, ShapeSummary};
pub use run_state::RunState;
