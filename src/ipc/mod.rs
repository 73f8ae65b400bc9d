//! IPC Layer - Unix socket server for CLI-daemon communication
//!
//! This module provides:
//! - Message types for requests, responses and pushed events
//! - Unix socket server for the daemon
//! - Client used by the CLI commands

pub mod client;
pub mod messages;
pub mod server;

pub use client::{IpcClient, IpcClientConfig};
pub use messages::{DaemonError, DaemonEvent, DaemonRequest, DaemonResponse, ErrorCode, Events, IpcMessage, Methods};
pub use server::{IpcServer, IpcServerConfig, RequestHandler};
