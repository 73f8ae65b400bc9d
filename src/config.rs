//! Configuration for ocihunt.
//!
//! Values come from a YAML file (fallback chain below), then environment
//! variables override them. `main` loads a `.env` file into the environment
//! before any of this runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainId;
use crate::error::{HuntError, Result};
use crate::events::{DEFAULT_LOG_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER};
use crate::provider::{LaunchSpec, OciCredentials};
use crate::runner::{DEFAULT_ATTEMPT_HISTORY, DomainList, EngineConfig, RunConfig};

/// The three Ashburn availability domains of the original free-tier tenancy
pub const DEFAULT_AVAILABILITY_DOMAINS: [&str; 3] = [
    "FpAe:US-ASHBURN-AD-1",
    "FpAe:US-ASHBURN-AD-2",
    "FpAe:US-ASHBURN-AD-3",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub oci: OciConfig,
    pub shape: ShapeConfig,
    pub engine: EngineSettings,
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OciConfig {
    pub tenancy_ocid: Option<String>,
    pub user_ocid: Option<String>,
    pub fingerprint: Option<String>,
    /// Inline PEM key
    pub private_key: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub region: String,
    pub compartment_id: Option<String>,
    pub subnet_id: Option<String>,
    pub image_id: Option<String>,
    pub ssh_public_key: Option<String>,
    pub display_name: String,
    pub availability_domains: Vec<String>,
    pub assign_public_ip: bool,
}

impl Default for OciConfig {
    fn default() -> Self {
        Self {
            tenancy_ocid: None,
            user_ocid: None,
            fingerprint: None,
            private_key: None,
            private_key_path: None,
            region: "us-ashburn-1".to_string(),
            compartment_id: None,
            subnet_id: None,
            image_id: None,
            ssh_public_key: None,
            display_name: "ubuntu-arm-free".to_string(),
            availability_domains: DEFAULT_AVAILABILITY_DOMAINS.iter().map(|s| s.to_string()).collect(),
            assign_public_ip: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub name: String,
    pub ocpus: u32,
    pub memory_gbs: u32,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            name: "VM.Standard.A1.Flex".to_string(),
            ocpus: 4,
            memory_gbs: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub retry_interval_secs: u64,
    pub attempt_timeout_secs: u64,
    pub event_log_capacity: usize,
    pub attempt_history_capacity: usize,
    pub subscriber_buffer: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry_interval_secs: 60,
            attempt_timeout_secs: 120,
            event_log_capacity: DEFAULT_LOG_CAPACITY,
            attempt_history_capacity: DEFAULT_ATTEMPT_HISTORY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub result_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            result_path: PathBuf::from("vm_creation_result.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Path or name of the `oci` executable
    pub oci_cli: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            oci_cli: PathBuf::from("oci"),
        }
    }
}

/// Which required settings are present. Never carries the values themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigCheck {
    pub fields: BTreeMap<String, bool>,
    pub missing: Vec<String>,
}

impl ConfigCheck {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn required(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HuntError::Config(format!("{} must be a number, got '{}'", key, value)))
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .map_err(|e| HuntError::Config(format!("Failed to load config from {}: {}", path.display(), e)));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `OCI_*` overrides from `lookup`. Empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let oci = &mut self.oci;

        if let Some(v) = get("OCI_TENANCY_OCID") {
            oci.tenancy_ocid = Some(v);
        }
        if let Some(v) = get("OCI_USER_OCID") {
            oci.user_ocid = Some(v);
        }
        if let Some(v) = get("OCI_FINGERPRINT") {
            oci.fingerprint = Some(v);
        }
        if let Some(v) = get("OCI_PRIVATE_KEY") {
            // .env files usually hold the PEM on one line with literal \n
            oci.private_key = Some(v.replace("\\n", "\n"));
        }
        if let Some(v) = get("OCI_PRIVATE_KEY_PATH") {
            oci.private_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("OCI_REGION") {
            oci.region = v;
        }
        if let Some(v) = get("OCI_COMPARTMENT_ID") {
            oci.compartment_id = Some(v);
        }
        if let Some(v) = get("OCI_SUBNET_ID") {
            oci.subnet_id = Some(v);
        }
        if let Some(v) = get("OCI_IMAGE_ID") {
            oci.image_id = Some(v);
        }
        if let Some(v) = get("OCI_SSH_PUBLIC_KEY") {
            oci.ssh_public_key = Some(v);
        }
        if let Some(v) = get("OCI_VM_DISPLAY_NAME") {
            oci.display_name = v;
        }
        if let Some(v) = get("OCI_AVAILABILITY_DOMAINS") {
            oci.availability_domains = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("OCI_OCPUS") {
            self.shape.ocpus = parse_number("OCI_OCPUS", &v)?;
        }
        if let Some(v) = get("OCI_MEMORY_GBS") {
            self.shape.memory_gbs = parse_number("OCI_MEMORY_GBS", &v)?;
        }
        if let Some(v) = get("OCI_RETRY_INTERVAL") {
            self.engine.retry_interval_secs = parse_number("OCI_RETRY_INTERVAL", &v)?;
        }
        Ok(())
    }

    /// Report which required settings are present.
    pub fn check(&self) -> ConfigCheck {
        let oci = &self.oci;
        let fields: BTreeMap<String, bool> = [
            ("tenancy_ocid", present(&oci.tenancy_ocid)),
            ("user_ocid", present(&oci.user_ocid)),
            ("fingerprint", present(&oci.fingerprint)),
            (
                "private_key",
                present(&oci.private_key) || oci.private_key_path.is_some(),
            ),
            ("region", !oci.region.trim().is_empty()),
            ("compartment_id", present(&oci.compartment_id)),
            ("subnet_id", present(&oci.subnet_id)),
            ("image_id", present(&oci.image_id)),
            ("ssh_public_key", present(&oci.ssh_public_key)),
            ("availability_domains", !oci.availability_domains.is_empty()),
        ]
        .into_iter()
        .map(|(name, ok)| (name.to_string(), ok))
        .collect();

        let missing = fields
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.clone())
            .collect();

        ConfigCheck { fields, missing }
    }

    /// Validate and build the settings for one run.
    pub fn run_config(&self) -> Result<RunConfig> {
        let check = self.check();
        if !check.is_complete() {
            return Err(HuntError::Config(format!("Missing config: {}", check.missing.join(", "))));
        }

        let domains = DomainList::new(self.oci.availability_domains.iter().map(|d| DomainId::new(d.as_str())))?;
        let run = RunConfig::new(domains, self.launch_spec())
            .with_retry_interval(Duration::from_secs(self.engine.retry_interval_secs))
            .with_attempt_timeout(self.attempt_timeout());
        Ok(run)
    }

    /// Deadline for one provider call, shared by the engine and the CLI provider
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.engine.attempt_timeout_secs.max(1))
    }

    pub fn launch_spec(&self) -> LaunchSpec {
        let oci = &self.oci;
        LaunchSpec {
            compartment_id: required(&oci.compartment_id),
            shape: self.shape.name.clone(),
            ocpus: self.shape.ocpus,
            memory_gbs: self.shape.memory_gbs,
            image_id: required(&oci.image_id),
            subnet_id: required(&oci.subnet_id),
            display_name: oci.display_name.clone(),
            ssh_public_key: required(&oci.ssh_public_key),
            assign_public_ip: oci.assign_public_ip,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            event_log_capacity: self.engine.event_log_capacity,
            attempt_history_capacity: self.engine.attempt_history_capacity,
            subscriber_buffer: self.engine.subscriber_buffer,
        }
    }

    pub fn credentials(&self) -> OciCredentials {
        let oci = &self.oci;
        OciCredentials {
            tenancy_ocid: required(&oci.tenancy_ocid),
            user_ocid: required(&oci.user_ocid),
            fingerprint: required(&oci.fingerprint),
            region: oci.region.clone(),
            key_file: oci.private_key_path.clone(),
            key_content: oci.private_key.clone().filter(|k| !k.trim().is_empty()),
        }
    }

    /// Socket the daemon listens on
    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(crate::daemon::default_socket_path)
    }
}
