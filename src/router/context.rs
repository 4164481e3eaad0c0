//! Per-request context passed through the dispatch pipeline.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::db::SharedStorage;
use crate::net::server::ServerState;
use crate::protocol::{Request, Response};
use crate::recommend::Strategy;

/// Identity of one accepted connection.
#[derive(Clone, Debug)]
pub struct ConnInfo {
    /// Generated unique identifier
    pub id: String,
    /// Remote address
    pub peer: SocketAddr,
}

impl fmt::Display for ConnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Client(id={}, host={}, port={})",
            self.id,
            self.peer.ip(),
            self.peer.port()
        )
    }
}

/// The per-request bundle handed to hooks and handlers.
///
/// Capability fields (`auth_token`, `strategy`) start empty and are
/// populated by dispatch and the before-handle hook.
pub struct Context {
    pub request: Request,
    pub conn: ConnInfo,
    pub server: Arc<ServerState>,
    pub db: SharedStorage,
    pub config: Arc<Config>,
    /// Response scaffold; the router attaches the wrapped handler result
    pub response: Response,
    /// Authorization header value, set when the route requires auth
    pub auth_token: Option<String>,
    /// Recommendation strategy selected for this request
    pub strategy: Option<Arc<dyn Strategy>>,
}

impl Context {
    pub fn new(request: Request, conn: ConnInfo, server: Arc<ServerState>) -> Context {
        let db = server.db.clone();
        let config = server.config.clone();
        Context {
            request,
            conn,
            server,
            db,
            config,
            response: Response::default(),
            auth_token: None,
            strategy: None,
        }
    }
}
