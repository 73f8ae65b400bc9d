//! Classified attempt outcomes.
//!
//! An `Outcome` is produced once per attempt by the classifier and never mutated.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifying fields of a freshly launched instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchedInstance {
    /// Instance OCID
    pub id: String,
    pub availability_domain: Option<String>,
    pub display_name: Option<String>,
    pub shape: Option<String>,
    pub lifecycle_state: Option<String>,
    pub time_created: Option<String>,
    /// Full provider payload, kept for the result record
    pub raw: Value,
}

impl LaunchedInstance {
    /// Extract instance fields from a launch payload.
    ///
    /// Accepts both the bare instance object and the `{"data": {...}}` envelope
    /// the CLI prints. Returns `None` when no instance id is present.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let data = payload.get("data").unwrap_or(payload);
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| data.get(*name).and_then(Value::as_str))
                .map(str::to_string)
        };

        let id = field(&["id"])?;
        Some(Self {
            id,
            availability_domain: field(&["availability-domain", "availability_domain"]),
            display_name: field(&["display-name", "display_name"]),
            shape: field(&["shape"]),
            lifecycle_state: field(&["lifecycle-state", "lifecycle_state"]),
            time_created: field(&["time-created", "time_created"]),
            raw: data.clone(),
        })
    }
}

/// Verdict for one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// Instance allocated
    Success(LaunchedInstance),
    /// Valid request, no host capacity in this domain right now
    CapacityUnavailable,
    /// Rate limit, network failure, timeout or an unrecognised response
    TransientError(String),
    /// Auth, configuration, quota or malformed request; never retried
    FatalError(String),
}

impl Outcome {
    /// Whether the engine should keep going after this outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self, Outcome::CapacityUnavailable | Outcome::TransientError(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::FatalError(_))
    }

    /// Error detail carried by the outcome, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::TransientError(reason) | Outcome::FatalError(reason) => Some(reason),
            Outcome::Success(_) | Outcome::CapacityUnavailable => None,
        }
    }

    /// Short label for status output
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::CapacityUnavailable => "capacity_unavailable",
            Outcome::TransientError(_) => "transient_error",
            Outcome::FatalError(_) => "fatal_error",
        }
    }
}
