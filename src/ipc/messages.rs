//! IPC message types for client ↔ daemon communication.
//!
//! Uses JSON Lines (newline-delimited JSON) over Unix stream socket.
//! Message schema uses familiar field names (id, method, params, result, error)
//! but does NOT implement JSON-RPC 2.0 specification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Event;
use crate::error::HuntError;

/// Request sent from a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    /// Unique request ID for correlating responses.
    pub id: u64,
    /// Method name (e.g., "run.start", "run.logs").
    pub method: String,
    /// Method parameters as JSON value.
    #[serde(default)]
    pub params: Value,
}

impl DaemonRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a request with no parameters.
    pub fn no_params(id: u64, method: impl Into<String>) -> Self {
        Self::new(id, method, Value::Object(Default::default()))
    }
}

/// Response sent from the daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DaemonError>,
}

impl DaemonResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: DaemonError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Error details in a daemon response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DaemonError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PARSE_ERROR, message)
    }

    /// Method not found error (-32601).
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("Unknown method: {}", method.into()),
        )
    }

    /// Invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, message)
    }

    /// Internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, message)
    }

    /// Invalid state error (1002).
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_STATE, message)
    }

    /// Config error (1003).
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CONFIG_ERROR, message)
    }
}

impl From<HuntError> for DaemonError {
    fn from(err: HuntError) -> Self {
        match &err {
            e if e.is_misuse() => DaemonError::invalid_state(e.to_string()),
            HuntError::Config(_) => DaemonError::config_error(err.to_string()),
            _ => DaemonError::internal_error(err.to_string()),
        }
    }
}

/// Standard error codes.
pub struct ErrorCode;

impl ErrorCode {
    /// Invalid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal daemon error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Engine in wrong state for action.
    pub const INVALID_STATE: i32 = 1002;
    /// Missing or invalid configuration.
    pub const CONFIG_ERROR: i32 = 1003;
}

/// Push event sent from the daemon to a streaming client (no request ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonEvent {
    pub event: String,
    pub data: Value,
}

impl DaemonEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Create a run.event event.
    pub fn run_event(event: &Event) -> Self {
        Self::new(Events::RUN_EVENT, serde_json::to_value(event).unwrap_or(Value::Null))
    }

    /// Create a run.state event carrying the status snapshot after a transition.
    pub fn run_state(status: Value) -> Self {
        Self::new(Events::RUN_STATE, status)
    }

    /// Create a run.lagged event telling the client how many events it missed.
    pub fn run_lagged(missed: u64) -> Self {
        Self::new(Events::RUN_LAGGED, serde_json::json!({ "missed": missed }))
    }
}

/// IPC message enum for unified handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpcMessage {
    Response(DaemonResponse),
    Event(DaemonEvent),
}

/// Known method names as constants.
pub struct Methods;

impl Methods {
    pub const PING: &'static str = "ping";

    pub const RUN_START: &'static str = "run.start";
    pub const RUN_STOP: &'static str = "run.stop";
    pub const RUN_STATUS: &'static str = "run.status";
    pub const RUN_LOGS: &'static str = "run.logs";
    pub const RUN_STREAM: &'static str = "run.stream";

    pub const CONFIG_CHECK: &'static str = "config.check";
}

/// Known event names as constants.
pub struct Events;

impl Events {
    pub const RUN_EVENT: &'static str = "run.event";
    pub const RUN_LAGGED: &'static str = "run.lagged";
    pub const RUN_STATE: &'static str = "run.state";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_request_no_params() {
        let req = DaemonRequest::no_params(42, Methods::PING);
        assert_eq!(req.id, 42);
        assert_eq!(req.method, "ping");
        assert!(req.params.is_object());
    }

    #[test]
    fn test_request_missing_params_defaults() {
        let req: DaemonRequest = serde_json::from_str(r#"{"id":7,"method":"run.status"}"#).unwrap();
        assert_eq!(req.id, 7);
        assert!(req.params.is_null());
    }

    #[test]
    fn test_daemon_response_success() {
        let resp = DaemonResponse::success(1, serde_json::json!({"run_id": 1}));
        assert!(resp.is_success());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_daemon_response_error() {
        let resp = DaemonResponse::error(1, DaemonError::invalid_state("A run is already active"));
        assert!(!resp.is_success());
        assert!(resp.result.is_none());
    }

    #[test]
    fn test_error_codes_from_hunt_error() {
        assert_eq!(DaemonError::from(HuntError::AlreadyRunning).code, ErrorCode::INVALID_STATE);
        assert_eq!(DaemonError::from(HuntError::NotRunning).code, ErrorCode::INVALID_STATE);
        assert_eq!(
            DaemonError::from(HuntError::Config("Missing config: subnet_id".into())).code,
            ErrorCode::CONFIG_ERROR
        );
        assert_eq!(
            DaemonError::from(HuntError::Storage("disk".into())).code,
            ErrorCode::INTERNAL_ERROR
        );
    }

    #[test]
    fn test_run_event() {
        let event = DaemonEvent::run_event(&Event::warn("Attempt 1 (AD-1): out of capacity"));
        assert_eq!(event.event, "run.event");
        assert_eq!(event.data["level"], "warn");
        assert_eq!(event.data["message"], "Attempt 1 (AD-1): out of capacity");
    }

    #[test]
    fn test_ipc_message_distinguishes_events() {
        let line = serde_json::to_string(&DaemonEvent::run_lagged(3)).unwrap();
        let parsed: IpcMessage = serde_json::from_str(&line).unwrap();
        match parsed {
            IpcMessage::Event(event) => assert_eq!(event.data["missed"], 3),
            IpcMessage::Response(_) => panic!("expected event"),
        }

        let line = serde_json::to_string(&DaemonResponse::success(2, serde_json::json!({}))).unwrap();
        assert!(matches!(serde_json::from_str(&line).unwrap(), IpcMessage::Response(_)));
    }
}
