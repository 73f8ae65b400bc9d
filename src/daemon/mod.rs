//! Daemon - long-running host for the retry engine
//!
//! The daemon:
//! - Owns one Engine built from the loaded configuration
//! - Serves run.* and config.* requests over the Unix socket
//! - Stops any active run gracefully on shutdown

pub mod context;
pub mod handlers;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;

pub use context::DaemonContext;
pub use handlers::DaemonHandler;

use crate::error::Result;
use crate::ipc::server::{IpcServer, IpcServerConfig};

/// Socket under the user's runtime dir, or /tmp when there is none
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ocihunt.sock")
}

/// Serve requests on `socket_path` until `shutdown` resolves.
pub async fn serve<S>(ctx: Arc<DaemonContext>, socket_path: PathBuf, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let server = IpcServer::new(IpcServerConfig::default().with_socket_path(&socket_path));
    let handler = Arc::new(DaemonHandler::new(Arc::clone(&ctx)));

    let result = server.run(handler, shutdown).await;

    let state = ctx.engine.shutdown().await;
    info!("Daemon stopped (engine {})", state);
    result
}
