//! IPC Server - Unix socket server for the daemon
//!
//! Provides:
//! - Unix stream socket listener
//! - Client connection handling
//! - Request routing and response sending
//! - Live run events and state changes for streaming clients

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use serde_json::Value;
use tokio::sync::{RwLock, watch};

use crate::domain::{Event, RunState};
use crate::error::{HuntError, Result};
use crate::events::Subscription;
use crate::ipc::messages::{DaemonError, DaemonEvent, DaemonRequest, DaemonResponse, Methods};

/// Configuration for the IPC server
#[derive(Debug, Clone)]
pub struct IpcServerConfig {
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Maximum number of concurrent clients
    pub max_clients: usize,
}

impl Default for IpcServerConfig {
    fn default() -> Self {
        Self {
            socket_path: crate::daemon::default_socket_path(),
            max_clients: 16,
        }
    }
}

impl IpcServerConfig {
    pub fn with_socket_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.socket_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }
}

/// Handler trait for processing requests
pub trait RequestHandler: Send + Sync {
    /// Handle a request and return a response
    fn handle(&self, request: DaemonRequest) -> impl Future<Output = DaemonResponse> + Send;

    /// Live event feed handed to clients that call `run.stream`
    fn subscribe(&self) -> Subscription;

    /// State transitions pushed to streaming clients
    fn watch_state(&self) -> watch::Receiver<RunState>;

    /// Status payload sent with every `run.state` push
    fn status(&self) -> Value;
}

/// Connected client state
#[derive(Debug, Default)]
struct ClientState {
    /// Whether the client asked for the live event stream
    streaming: bool,
}

/// IPC Server for daemon communication
pub struct IpcServer {
    config: IpcServerConfig,
    clients: Arc<RwLock<HashMap<u64, ClientState>>>,
}

impl IpcServer {
    pub fn new(config: IpcServerConfig) -> Self {
        Self {
            config,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Get count of connected clients
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get count of clients receiving the live stream
    pub async fn streaming_count(&self) -> usize {
        self.clients.read().await.values().filter(|c| c.streaming).count()
    }

    /// Serve until `shutdown` resolves, then remove the socket file.
    pub async fn run<H, S>(&self, handler: Arc<H>, shutdown: S) -> Result<()>
    where
        H: RequestHandler + 'static,
        S: Future<Output = ()>,
    {
        // Remove a stale socket left by a previous daemon
        if self.config.socket_path.exists() {
            std::fs::remove_file(&self.config.socket_path)?;
        }

        if let Some(parent) = self.config.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.config.socket_path)
            .map_err(|e| HuntError::Ipc(format!("Failed to bind socket: {}", e)))?;
        info!("Listening on {}", self.config.socket_path.display());

        tokio::pin!(shutdown);
        let mut next_client_id: u64 = 1;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let client_count = self.clients.read().await.len();
                            if client_count >= self.config.max_clients {
                                warn!("Rejecting client: {} clients connected", client_count);
                                continue;
                            }

                            let client_id = next_client_id;
                            next_client_id += 1;
                            self.clients.write().await.insert(client_id, ClientState::default());
                            debug!("Client {} connected", client_id);

                            let handler = Arc::clone(&handler);
                            let clients = Arc::clone(&self.clients);
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, client_id, handler, Arc::clone(&clients)).await {
                                    debug!("Client {} ended with error: {}", client_id, e);
                                }
                                clients.write().await.remove(&client_id);
                                debug!("Client {} disconnected", client_id);
                            });
                        }
                        Err(e) => {
                            warn!("Accept error: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("IPC server shutting down");
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.config.socket_path);
        Ok(())
    }
}

async fn write_line<T: serde::Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}

/// Next event for a streaming client; pending forever when not streaming.
async fn next_event(stream: &mut Option<Subscription>) -> Option<(Event, u64)> {
    match stream {
        Some(subscription) => {
            let before = subscription.missed();
            let event = subscription.recv().await?;
            Some((event, subscription.missed() - before))
        }
        None => std::future::pending().await,
    }
}

/// Next state transition for a streaming client; pending forever when not streaming.
async fn next_state(states: &mut Option<watch::Receiver<RunState>>) -> Option<RunState> {
    match states {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(*rx.borrow_and_update())
        }
        None => std::future::pending().await,
    }
}

/// Handle a single client connection
async fn handle_client<H: RequestHandler>(
    stream: UnixStream,
    client_id: u64,
    handler: Arc<H>,
    clients: Arc<RwLock<HashMap<u64, ClientState>>>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut events: Option<Subscription> = None;
    let mut states: Option<watch::Receiver<RunState>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break; // EOF - client disconnected
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let response = match serde_json::from_str::<DaemonRequest>(trimmed) {
                    Ok(request) if request.method == Methods::RUN_STREAM => {
                        events = Some(handler.subscribe());
                        let mut rx = handler.watch_state();
                        rx.mark_unchanged();
                        states = Some(rx);
                        if let Some(state) = clients.write().await.get_mut(&client_id) {
                            state.streaming = true;
                        }
                        DaemonResponse::success(request.id, serde_json::json!({ "streaming": true }))
                    }
                    Ok(request) => handler.handle(request).await,
                    Err(e) => DaemonResponse::error(0, DaemonError::parse_error(format!("Parse error: {}", e))),
                };
                write_line(&mut writer, &response).await?;
            }
            next = next_event(&mut events) => {
                match next {
                    Some((event, missed)) => {
                        if missed > 0 {
                            write_line(&mut writer, &DaemonEvent::run_lagged(missed)).await?;
                        }
                        write_line(&mut writer, &DaemonEvent::run_event(&event)).await?;
                    }
                    // Event source gone; keep serving requests
                    None => events = None,
                }
            }
            next = next_state(&mut states) => {
                match next {
                    Some(state) => {
                        debug!("Client {}: pushing state {}", client_id, state);
                        write_line(&mut writer, &DaemonEvent::run_state(handler.status())).await?;
                    }
                    None => states = None,
                }
            }
        }
    }

    Ok(())
}
