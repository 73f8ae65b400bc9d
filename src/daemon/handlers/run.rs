//! Run request handlers
//!
//! Handles run.* IPC methods by delegating to the engine.

use serde_json::{Value, json};

use crate::daemon::context::DaemonContext;
use crate::ipc::messages::{DaemonError, DaemonResponse};

fn to_response<T: serde::Serialize>(id: u64, value: &T) -> DaemonResponse {
    match serde_json::to_value(value) {
        Ok(value) => DaemonResponse::success(id, value),
        Err(e) => DaemonResponse::error(id, DaemonError::internal_error(e.to_string())),
    }
}

/// Handle run.start - validate config and begin a new run
pub async fn handle_run_start(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    let run = match ctx.run_config() {
        Ok(run) => run,
        Err(e) => return DaemonResponse::error(id, e.into()),
    };

    match ctx.engine.start(run) {
        Ok(run_id) => DaemonResponse::success(id, json!({ "run_id": run_id, "state": "running" })),
        Err(e) => DaemonResponse::error(id, e.into()),
    }
}

/// Handle run.stop - request a graceful stop
pub async fn handle_run_stop(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    match ctx.engine.stop() {
        Ok(()) => DaemonResponse::success(id, json!({ "state": ctx.engine.state() })),
        Err(e) => DaemonResponse::error(id, e.into()),
    }
}

/// Handle run.status - point-in-time snapshot
pub async fn handle_run_status(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    to_response(id, &ctx.engine.snapshot())
}

/// Handle run.logs - retained events, optionally only those after `since`
pub async fn handle_run_logs(id: u64, params: &Value, ctx: &DaemonContext) -> DaemonResponse {
    let since = match &params["since"] {
        Value::Null => 0,
        value => match value.as_u64() {
            Some(since) => since,
            None => {
                return DaemonResponse::error(
                    id,
                    DaemonError::invalid_params("'since' must be a non-negative integer"),
                );
            }
        },
    };

    to_response(id, &ctx.engine.history_since(since))
}
