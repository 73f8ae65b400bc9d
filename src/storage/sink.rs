//! Result sinks - where the record of a successful run ends up.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::ResultRecord;
use crate::error::{HuntError, Result};

/// Durable destination for the success record.
pub trait ResultSink: Send + Sync {
    /// Persist the record, replacing whatever a previous run wrote.
    fn write(&self, record: &ResultRecord) -> Result<()>;

    /// Human-readable location, used in events
    fn location(&self) -> String;
}

/// Writes the record as pretty-printed JSON to a single file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back a previously written record
    pub fn load(&self) -> Result<Option<ResultRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl ResultSink for JsonFileSink {
    fn write(&self, record: &ResultRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target and rename so readers never see half a file.
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, record)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            HuntError::Storage(format!("Failed to move result into {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps records in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
    fail_with: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose writes always fail with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    /// Every write call that succeeded, in order
    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ResultSink for MemorySink {
    fn write(&self, record: &ResultRecord) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(HuntError::Storage(message.clone()));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
