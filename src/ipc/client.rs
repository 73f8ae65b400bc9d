//! IPC client for CLI commands talking to the daemon.
//!
//! Provides async connection to the daemon Unix socket with:
//! - Request/response communication
//! - Live run event streaming

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::daemon::default_socket_path;
use crate::error::{HuntError, Result};
use crate::ipc::messages::{DaemonError, DaemonEvent, DaemonRequest, DaemonResponse, Methods};

/// Configuration for IPC client.
#[derive(Debug, Clone)]
pub struct IpcClientConfig {
    /// Path to daemon Unix socket.
    pub socket_path: PathBuf,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for IpcClientConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: 30000,
        }
    }
}

impl IpcClientConfig {
    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Default::default()
        }
    }
}

type PendingMap = HashMap<u64, oneshot::Sender<DaemonResponse>>;

/// IPC client for communicating with the daemon.
pub struct IpcClient {
    config: IpcClientConfig,
    writer: Mutex<Option<OwnedWriteHalf>>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    event_sender: mpsc::Sender<DaemonEvent>,
    event_receiver: Mutex<mpsc::Receiver<DaemonEvent>>,
}

impl IpcClient {
    pub fn new(config: IpcClientConfig) -> Self {
        let (event_sender, event_receiver) = mpsc::channel(256);
        Self {
            config,
            writer: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            connected: Arc::new(AtomicBool::new(false)),
            event_sender,
            event_receiver: Mutex::new(event_receiver),
        }
    }

    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self::new(IpcClientConfig::with_socket(path))
    }

    /// Connect to the daemon and start the reader task.
    pub async fn connect(&self) -> Result<()> {
        let stream = UnixStream::connect(&self.config.socket_path).await.map_err(|e| {
            HuntError::Ipc(format!(
                "Failed to connect to {}: {} (is `ocihunt daemon` running?)",
                self.config.socket_path.display(),
                e
            ))
        })?;

        let (reader, writer) = stream.into_split();
        *self.writer.lock().await = Some(writer);
        self.connected.store(true, Ordering::SeqCst);

        let pending = Arc::clone(&self.pending);
        let event_sender = self.event_sender.clone();
        let connected = Arc::clone(&self.connected);

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Responses carry an id, pushed events do not
                if let Ok(response) = serde_json::from_str::<DaemonResponse>(line) {
                    if let Some(sender) = pending.lock().await.remove(&response.id) {
                        let _ = sender.send(response);
                    }
                } else if let Ok(event) = serde_json::from_str::<DaemonEvent>(line) {
                    if event_sender.send(event).await.is_err() {
                        break;
                    }
                } else {
                    log::debug!("Ignoring unknown message: {}", line);
                }
            }
            connected.store(false, Ordering::SeqCst);
            // Dropping the senders wakes every waiting request
            pending.lock().await.clear();
        });

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Send a request and wait for the raw response.
    pub async fn request(&self, method: &str, params: Value) -> Result<DaemonResponse> {
        if !self.is_connected() {
            return Err(HuntError::Ipc("Not connected".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = DaemonRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        {
            let mut writer = self.writer.lock().await;
            let Some(w) = writer.as_mut() else {
                self.pending.lock().await.remove(&id);
                return Err(HuntError::Ipc("Writer not available".into()));
            };
            let mut json = serde_json::to_string(&request)?;
            json.push('\n');
            w.write_all(json.as_bytes())
                .await
                .map_err(|e| HuntError::Ipc(format!("Failed to write: {}", e)))?;
            w.flush()
                .await
                .map_err(|e| HuntError::Ipc(format!("Failed to flush: {}", e)))?;
        }

        let timeout = tokio::time::Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(HuntError::Ipc("Connection closed by daemon".into())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(HuntError::Ipc("Request timeout".into()))
            }
        }
    }

    /// Send a request and unwrap the result, turning daemon errors into `Err`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let response = self.request(method, params).await?;
        match response.error {
            Some(DaemonError { message, .. }) => Err(HuntError::Ipc(message)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    /// Receive next pushed event. `None` once the connection is gone.
    pub async fn recv_event(&self) -> Option<DaemonEvent> {
        self.event_receiver.lock().await.recv().await
    }

    pub async fn ping(&self) -> Result<bool> {
        let response = self.request(Methods::PING, Value::Null).await?;
        Ok(response.is_success())
    }

    pub async fn start_run(&self) -> Result<DaemonResponse> {
        self.request(Methods::RUN_START, Value::Null).await
    }

    pub async fn stop_run(&self) -> Result<DaemonResponse> {
        self.request(Methods::RUN_STOP, Value::Null).await
    }

    pub async fn status(&self) -> Result<Value> {
        self.call(Methods::RUN_STATUS, Value::Null).await
    }

    pub async fn logs(&self, since: Option<u64>) -> Result<Value> {
        self.call(Methods::RUN_LOGS, serde_json::json!({ "since": since })).await
    }

    /// Ask the daemon to push `run.event` messages to this connection.
    pub async fn stream(&self) -> Result<()> {
        self.call(Methods::RUN_STREAM, Value::Null).await.map(|_| ())
    }

    pub async fn config_check(&self) -> Result<Value> {
        self.call(Methods::CONFIG_CHECK, Value::Null).await
    }
}
