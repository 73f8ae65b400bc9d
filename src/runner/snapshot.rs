//! Point-in-time status view for polling readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainId, Event, LaunchedInstance, RunState};

/// Read-only projection of the engine's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Identifier of the current (or last) run, 0 before the first start
    pub run_id: u64,
    pub state: RunState,
    /// Domain the next (or in-flight) attempt targets
    pub current_domain: Option<DomainId>,
    pub attempt_count: u64,
    pub last_event: Option<Event>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set once a run succeeded
    pub instance: Option<LaunchedInstance>,
}

impl StatusSnapshot {
    pub fn is_running(&self) -> bool {
        self.state.is_active()
    }

    /// One-line summary for terminals
    pub fn summary(&self) -> String {
        let domain = self
            .current_domain
            .as_ref()
            .map(|d| d.short().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "run #{} {} | attempts: {} | domain: {}",
            self.run_id, self.state, self.attempt_count, domain
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: RunState) -> StatusSnapshot {
        StatusSnapshot {
            run_id: 2,
            state,
            current_domain: Some(DomainId::new("FpAe:US-ASHBURN-AD-3")),
            attempt_count: 14,
            last_event: None,
            started_at: None,
            finished_at: None,
            instance: None,
        }
    }

    #[test]
    fn test_is_running() {
        assert!(snapshot(RunState::Running).is_running());
        assert!(snapshot(RunState::Stopping).is_running());
        assert!(!snapshot(RunState::Stopped).is_running());
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            snapshot(RunState::Running).summary(),
            "run #2 running | attempts: 14 | domain: AD-3"
        );
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(snapshot(RunState::Failed)).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["current_domain"], "FpAe:US-ASHBURN-AD-3");
        assert_eq!(json["attempt_count"], 14);
    }
}
