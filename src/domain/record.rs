//! Result record persisted once a run succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::attempt::DomainId;
use super::outcome::LaunchedInstance;

/// Durable record of a successful launch. Written once per successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub success: bool,
    pub run_id: u64,
    pub instance_id: String,
    pub availability_domain: DomainId,
    pub shape: String,
    pub ocpus: u32,
    pub memory_gbs: u32,
    /// Number of attempts the run needed
    pub attempts: u64,
    pub started_at: DateTime<Utc>,
    /// When the success was observed
    pub timestamp: DateTime<Utc>,
    /// Provider payload for the new instance
    pub details: Value,
}

impl ResultRecord {
    pub fn new(
        run_id: u64,
        instance: &LaunchedInstance,
        domain: DomainId,
        shape: &ShapeSummary,
        attempts: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            success: true,
            run_id,
            instance_id: instance.id.clone(),
            availability_domain: domain,
            shape: shape.name.clone(),
            ocpus: shape.ocpus,
            memory_gbs: shape.memory_gbs,
            attempts,
            started_at,
            timestamp: Utc::now(),
            details: instance.raw.clone(),
        }
    }
}

/// Shape fields echoed into the result record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSummary {
    pub name: String,
    pub ocpus: u32,
    pub memory_gbs: u32,
}
