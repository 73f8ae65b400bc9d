//! Request handlers for the daemon
//!
//! Each submodule handles a category of IPC methods:
//! - run: run lifecycle (start, stop, status, logs)
//! - config: config.check and ping
//!
//! `run.stream` is answered by the IPC server itself using `subscribe`,
//! `watch_state` and `status`.

pub mod config;
pub mod run;

use std::future::Future;
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use tokio::sync::watch;

pub use config::*;
pub use run::*;

use crate::daemon::context::DaemonContext;
use crate::domain::RunState;
use crate::events::Subscription;
use crate::ipc::messages::{DaemonError, DaemonRequest, DaemonResponse, Methods};
use crate::ipc::server::RequestHandler;

/// Routes IPC requests to the handler functions
pub struct DaemonHandler {
    ctx: Arc<DaemonContext>,
}

impl DaemonHandler {
    pub fn new(ctx: Arc<DaemonContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DaemonContext {
        &self.ctx
    }

    pub async fn dispatch(&self, request: DaemonRequest) -> DaemonResponse {
        debug!("Request {}: {}", request.id, request.method);
        let ctx = self.ctx.as_ref();
        match request.method.as_str() {
            Methods::PING => handle_ping(request.id).await,
            Methods::RUN_START => handle_run_start(request.id, ctx).await,
            Methods::RUN_STOP => handle_run_stop(request.id, ctx).await,
            Methods::RUN_STATUS => handle_run_status(request.id, ctx).await,
            Methods::RUN_LOGS => handle_run_logs(request.id, &request.params, ctx).await,
            Methods::CONFIG_CHECK => handle_config_check(request.id, ctx).await,
            other => DaemonResponse::error(request.id, DaemonError::method_not_found(other)),
        }
    }
}

impl RequestHandler for DaemonHandler {
    fn handle(&self, request: DaemonRequest) -> impl Future<Output = DaemonResponse> + Send {
        self.dispatch(request)
    }

    fn subscribe(&self) -> Subscription {
        self.ctx.engine.subscribe()
    }

    fn watch_state(&self) -> watch::Receiver<RunState> {
        self.ctx.engine.watch_state()
    }

    fn status(&self) -> Value {
        serde_json::to_value(self.ctx.engine.snapshot()).unwrap_or(Value::Null)
    }
}
