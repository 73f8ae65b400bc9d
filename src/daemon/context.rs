//! Daemon context - shared state for request handlers
//!
//! DaemonContext owns the engine and the configuration runs are started from.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::provider::{OciCliProvider, Provider};
use crate::runner::{Engine, RunConfig};
use crate::storage::{JsonFileSink, ResultSink};

/// Shared context for all daemon request handlers
pub struct DaemonContext {
    /// The single retry engine
    pub engine: Engine,
    /// Configuration used for config.check and every run.start
    pub config: Config,
}

impl DaemonContext {
    /// Build the production context: `oci` CLI provider and JSON result file.
    pub fn from_config(config: Config) -> Self {
        let provider = Arc::new(
            OciCliProvider::new(config.provider.oci_cli.clone(), config.credentials())
                .with_timeout(config.attempt_timeout()),
        );
        let sink = Arc::new(JsonFileSink::new(config.storage.result_path.clone()));
        Self::new(config, provider, sink)
    }

    pub fn new(config: Config, provider: Arc<dyn Provider>, sink: Arc<dyn ResultSink>) -> Self {
        let engine = Engine::new(provider, sink, config.engine_config());
        Self { engine, config }
    }

    /// Validated settings for the next run
    pub fn run_config(&self) -> Result<RunConfig> {
        self.config.run_config()
    }
}
