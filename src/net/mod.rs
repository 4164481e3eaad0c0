//! Network layer for the kresnik server.
//!
//! This module contains:
//! - `registry`: the mutex-guarded active-connection registry
//! - `conn`: the per-connection worker (read, decode, dispatch, respond)
//! - `server`: socket setup, accept loop, load shedding and shutdown

pub mod conn;
pub mod registry;
pub mod server;

// Re-export main entry points
pub use registry::ConnRegistry;
pub use server::{Hooks, NoHooks, RunningServer, Server, ServerHandle, ServerState};
