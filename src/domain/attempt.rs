//! Placement domains and per-attempt records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::Outcome;

/// Identifier of an availability (placement) domain, e.g. `FpAe:US-ASHBURN-AD-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for messages: `FpAe:US-ASHBURN-AD-1` becomes `AD-1`.
    pub fn short(&self) -> &str {
        match self.0.rmatch_indices('-').nth(1) {
            Some((idx, _)) => &self.0[idx + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One provider call within a run. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Sequence number within the run, starts at 1
    pub seq: u64,
    /// Domain the attempt targeted
    pub domain: DomainId,
    /// When the provider call returned
    pub timestamp: DateTime<Utc>,
    /// Classified outcome
    pub outcome: Outcome,
}

impl Attempt {
    pub fn new(seq: u64, domain: DomainId, outcome: Outcome) -> Self {
        Self {
            seq,
            domain,
            timestamp: Utc::now(),
            outcome,
        }
    }

    /// Error detail, present for transient and fatal outcomes
    pub fn error_detail(&self) -> Option<&str> {
        self.outcome.detail()
    }
}
