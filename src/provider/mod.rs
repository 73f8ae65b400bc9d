//! Provider capability - the opaque "try to create an instance" call.
//!
//! The engine only ever sees a `RawResponse`; interpreting it is the
//! classifier's job. Implementations:
//! - OciCliProvider: drives the `oci` command line client
//! - ScriptedProvider: replays canned responses (tests, dry runs)

mod oci_cli;
mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DomainId, ShapeSummary};

pub use oci_cli::{OciCliProvider, OciCredentials, parse_cli_output};
pub use scripted::ScriptedProvider;

/// Capability to attempt one instance creation in one domain.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Make a single creation request. Never retries internally.
    ///
    /// Dropping the returned future must abort the request, so a call the
    /// engine gave up on cannot create an instance later.
    async fn attempt_create(&self, domain: &DomainId, launch: &LaunchSpec) -> RawResponse;
}

/// Everything the launch request needs besides the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub compartment_id: String,
    pub shape: String,
    pub ocpus: u32,
    pub memory_gbs: u32,
    pub image_id: String,
    pub subnet_id: String,
    pub display_name: String,
    pub ssh_public_key: String,
    pub assign_public_ip: bool,
}

impl LaunchSpec {
    pub fn shape_summary(&self) -> ShapeSummary {
        ShapeSummary {
            name: self.shape.clone(),
            ocpus: self.ocpus,
            memory_gbs: self.memory_gbs,
        }
    }

    /// One-line description used in the run start event
    pub fn describe(&self) -> String {
        format!(
            "Shape: {}, {} OCPUs, {} GB RAM",
            self.shape, self.ocpus, self.memory_gbs
        )
    }
}

/// Unclassified result of a provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawResponse {
    /// The provider accepted the launch; payload describes the instance
    Launched { payload: Value },
    /// The provider answered with a service error
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },
    /// The call never got a provider answer (connection, spawn failure)
    Transport { detail: String },
    /// The call exceeded the attempt timeout
    TimedOut,
    /// Output that could not be interpreted
    Unrecognized { detail: String },
}

impl RawResponse {
    pub fn launched(payload: Value) -> Self {
        RawResponse::Launched { payload }
    }

    pub fn service_error(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        RawResponse::ServiceError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The error OCI returns when a domain has no free A1 hosts
    pub fn out_of_capacity() -> Self {
        Self::service_error(500, "InternalError", "Out of host capacity.")
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        RawResponse::Transport { detail: detail.into() }
    }

    pub fn unrecognized(detail: impl Into<String>) -> Self {
        RawResponse::Unrecognized { detail: detail.into() }
    }
}

#[cfg(test)]
pub(crate) fn test_launch_spec() -> LaunchSpec {
    LaunchSpec {
        compartment_id: "ocid1.compartment.oc1..c".into(),
        shape: "VM.Standard.A1.Flex".into(),
        ocpus: 4,
        memory_gbs: 24,
        image_id: "ocid1.image.oc1.iad.i".into(),
        subnet_id: "ocid1.subnet.oc1.iad.s".into(),
        display_name: "ubuntu-arm-free".into(),
        ssh_public_key: "ssh-ed25519 AAAA test".into(),
        assign_public_ip: true,
    }
}
