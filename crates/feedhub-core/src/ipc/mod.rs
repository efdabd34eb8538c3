//! IPC module for daemon-client communication.
//!
//! The daemon exposes the whole API surface as newline-delimited
//! JSON-RPC over a Unix socket; an HTTP gateway, if any, sits in front
//! of this and forwards the authenticated user id with each request.

mod client;
mod protocol;
mod server;

pub use client::{is_daemon_running, DaemonClient};
pub use protocol::*;
pub use server::DaemonServer;
