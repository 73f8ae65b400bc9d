//! Config request handlers

use serde_json::json;

use crate::daemon::context::DaemonContext;
use crate::ipc::messages::{DaemonError, DaemonResponse};

/// Handle config.check - which required settings are present (booleans only)
pub async fn handle_config_check(id: u64, ctx: &DaemonContext) -> DaemonResponse {
    let check = ctx.config.check();
    match serde_json::to_value(&check) {
        Ok(value) => DaemonResponse::success(id, value),
        Err(e) => DaemonResponse::error(id, DaemonError::internal_error(e.to_string())),
    }
}

/// Handle ping
pub async fn handle_ping(id: u64) -> DaemonResponse {
    DaemonResponse::success(id, json!({ "pong": true, "version": env!("CARGO_PKG_VERSION") }))
}
