//! Provider backed by the `oci` command line client.
//!
//! The CLI takes care of request signing. Credentials are handed over through
//! its `OCI_CLI_*` environment variables so no config file is needed.
//!
//! A launch is never left running unobserved: the CLI gets connection and read
//! timeouts that end the call before the engine's attempt deadline, and the
//! child process is killed if the call is dropped anyway.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use tokio::process::Command;

use super::{LaunchSpec, Provider, RawResponse};
use crate::domain::DomainId;

/// API-key credentials for the CLI.
#[derive(Debug, Clone, Default)]
pub struct OciCredentials {
    pub tenancy_ocid: String,
    pub user_ocid: String,
    pub fingerprint: String,
    pub region: String,
    /// Path to the PEM private key
    pub key_file: Option<PathBuf>,
    /// Inline PEM private key, used when no key file is set
    pub key_content: Option<String>,
}

impl OciCredentials {
    fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("OCI_CLI_TENANCY", self.tenancy_ocid.clone()),
            ("OCI_CLI_USER", self.user_ocid.clone()),
            ("OCI_CLI_FINGERPRINT", self.fingerprint.clone()),
            ("OCI_CLI_REGION", self.region.clone()),
        ];
        if let Some(path) = &self.key_file {
            env.push(("OCI_CLI_KEY_FILE", path.display().to_string()));
        } else if let Some(content) = &self.key_content {
            env.push(("OCI_CLI_KEY_CONTENT", content.clone()));
        }
        env
    }
}

/// Slack between the CLI's own timeouts and the engine's attempt deadline
const DEADLINE_MARGIN_SECS: u64 = 5;
/// Upper bound for the CLI connection timeout
const MAX_CONNECT_SECS: u64 = 10;

/// Launches instances by running `oci compute instance launch`.
pub struct OciCliProvider {
    binary: PathBuf,
    credentials: OciCredentials,
    timeout: Duration,
}

impl OciCliProvider {
    pub fn new(binary: impl Into<PathBuf>, credentials: OciCredentials) -> Self {
        Self {
            binary: binary.into(),
            credentials,
            timeout: crate::runner::DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Deadline the CLI must finish within; should match the engine's attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Global CLI flags: no internal retries, and timeouts inside the deadline.
    pub fn global_args(timeout: Duration) -> Vec<String> {
        let total = timeout.as_secs().max(2);
        let connect = (total / 4).clamp(1, MAX_CONNECT_SECS);
        let read = total.saturating_sub(connect + DEADLINE_MARGIN_SECS).max(1);
        vec![
            "--no-retry".into(),
            "--connection-timeout".into(),
            connect.to_string(),
            "--read-timeout".into(),
            read.to_string(),
        ]
    }

    /// CLI arguments for one launch request
    pub fn launch_args(domain: &DomainId, launch: &LaunchSpec) -> Vec<String> {
        let shape_config = serde_json::json!({
            "ocpus": launch.ocpus,
            "memoryInGBs": launch.memory_gbs,
        });
        let metadata = serde_json::json!({
            "ssh_authorized_keys": launch.ssh_public_key,
        });

        vec![
            "compute".into(),
            "instance".into(),
            "launch".into(),
            "--availability-domain".into(),
            domain.to_string(),
            "--compartment-id".into(),
            launch.compartment_id.clone(),
            "--shape".into(),
            launch.shape.clone(),
            "--shape-config".into(),
            shape_config.to_string(),
            "--image-id".into(),
            launch.image_id.clone(),
            "--subnet-id".into(),
            launch.subnet_id.clone(),
            "--display-name".into(),
            launch.display_name.clone(),
            "--assign-public-ip".into(),
            launch.assign_public_ip.to_string(),
            "--metadata".into(),
            metadata.to_string(),
        ]
    }
}

#[async_trait]
impl Provider for OciCliProvider {
    async fn attempt_create(&self, domain: &DomainId, launch: &LaunchSpec) -> RawResponse {
        debug!("Invoking {} for {}", self.binary.display(), domain);

        let output = Command::new(&self.binary)
            .args(Self::global_args(self.timeout))
            .args(Self::launch_args(domain, launch))
            .envs(self.credentials.env())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                parse_cli_output(output.status.success(), &stdout, &stderr)
            }
            Err(e) => RawResponse::transport(format!("failed to run {}: {}", self.binary.display(), e)),
        }
    }
}

/// Interpret the CLI's exit status and output streams.
///
/// Successful launches print `{"data": {...}}` on stdout. Service failures
/// print `ServiceError:` followed by a JSON object on stderr.
pub fn parse_cli_output(success: bool, stdout: &str, stderr: &str) -> RawResponse {
    if success {
        return match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(payload) => RawResponse::launched(payload),
            Err(e) => RawResponse::unrecognized(format!("unparseable launch output: {}", e)),
        };
    }

    if let Some(idx) = stderr.find("ServiceError:") {
        let body = &stderr[idx + "ServiceError:".len()..];
        if let Ok(error) = serde_json::from_str::<Value>(body.trim()) {
            let status = error.get("status").and_then(Value::as_u64).unwrap_or(0) as u16;
            let text = |key: &str| {
                error
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            return RawResponse::service_error(status, text("code"), text("message"));
        }
    }

    let lower = stderr.to_lowercase();
    if lower.contains("connection") || lower.contains("timed out") || lower.contains("name resolution") {
        return RawResponse::transport(stderr.trim());
    }

    RawResponse::unrecognized(stderr.trim())
}
