//! TCP server: socket setup, accept loop, load shedding and shutdown.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::*;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::watch;
use uuid::Uuid;

use crate::common::error::RequestError;
use crate::config::Config;
use crate::db::SharedStorage;
use crate::metrics::METRICS;
use crate::protocol::Response;
use crate::router::{ConnInfo, Context, EndpointTable, Route};
use crate::secure::SessionTable;

use super::conn::handle_connection;
use super::registry::ConnRegistry;

/// Per-request extension points for collaborators.
///
/// `before_handle` may populate the context's capability fields (auth
/// user, recommendation strategy); `override_response` gets the last word
/// on the outgoing response.
pub trait Hooks: Send + Sync {
    fn before_handle(&self, _ctx: &mut Context) -> Result<(), RequestError> {
        Ok(())
    }

    fn after_handle(&self, _ctx: &Context) {}

    fn override_response(&self, _ctx: &Context, response: Response) -> Response {
        response
    }
}

/// Default hooks: every extension point is a no-op.
pub struct NoHooks;

impl Hooks for NoHooks {}

/// Process-scoped state shared by the accept loop and all workers.
pub struct ServerState {
    pub config: Arc<Config>,
    pub db: SharedStorage,
    pub endpoints: EndpointTable,
    pub sessions: SessionTable,
    pub registry: ConnRegistry,
    pub hooks: Arc<dyn Hooks>,
}

/// Server under construction: routes and hooks are attached here, then
/// `bind` freezes the endpoint table and opens the listening socket.
pub struct Server {
    config: Arc<Config>,
    db: SharedStorage,
    endpoints: EndpointTable,
    hooks: Arc<dyn Hooks>,
}

impl Server {
    pub fn new(config: Arc<Config>, db: SharedStorage) -> Server {
        let mut endpoints = EndpointTable::new();

        // the handshake endpoint bootstraps the encrypted channel
        if config.server.secure {
            endpoints.register(crate::secure::handshake_route());
        }

        Server {
            config,
            db,
            endpoints,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Register an endpoint. Duplicate paths are logged and rejected.
    pub fn register(&mut self, route: Route) {
        self.endpoints.register(route);
    }

    pub fn set_hooks(&mut self, hooks: Arc<dyn Hooks>) {
        self.hooks = hooks;
    }

    /// Open the listening socket with address reuse and the configured
    /// backlog. Must be called from within the tokio runtime. A bind
    /// failure is logged and the server never starts accepting.
    pub fn bind(self) -> io::Result<RunningServer> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("bad bind address: {}", e)))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

        // allows restarting without waiting for the OS to release the port
        socket.set_reuse_address(true)?;

        if let Err(e) = socket.bind(&addr.into()) {
            error!("failed to bind to {}: port is perhaps unavailable: {}", addr, e);
            return Err(e);
        }
        socket.listen(self.config.limits.backlog)?;
        socket.set_nonblocking(true)?;

        let listener = TcpListener::from_std(socket.into())?;
        let local = listener.local_addr()?;
        info!(
            "server is listening on {} (secure={})",
            local, self.config.server.secure
        );

        // the receiver is created here so a close signalled before the
        // accept loop first polls is still observed
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = Arc::new(ServerState {
            config: self.config,
            db: self.db,
            endpoints: self.endpoints,
            sessions: SessionTable::new(),
            registry: ConnRegistry::new(),
            hooks: self.hooks,
        });

        Ok(RunningServer {
            state,
            listener,
            shutdown_tx,
            shutdown_rx,
        })
    }
}

/// A bound server ready to accept connections.
pub struct RunningServer {
    state: Arc<ServerState>,
    listener: TcpListener,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RunningServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// Handle for signalling shutdown from another task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown_tx.clone(),
        }
    }

    /// Accept loop. Runs until `close` is signalled, then joins every
    /// tracked worker and releases the listening socket.
    pub async fn serve(self) {
        let RunningServer {
            state,
            listener,
            shutdown_tx: _shutdown_tx,
            mut shutdown_rx,
        } = self;
        let cap = state.config.limits.max_active_conns;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept: {}", e);
                            continue;
                        }
                    };

                    // load shedding: no queue beyond the OS listen backlog
                    if state.registry.len() >= cap {
                        warn!("rejecting connection from {}: server is full", peer);
                        METRICS.inc_rejected_full();
                        drop(stream);
                        continue;
                    }

                    let conn = ConnInfo {
                        id: Uuid::new_v4().simple().to_string(),
                        peer,
                    };
                    debug!("accepted connection from {} as {}", peer, conn.id);
                    METRICS.inc_accepted();

                    state.registry.insert(&conn.id, peer);
                    let id = conn.id.clone();
                    let worker_state = state.clone();
                    let handle = tokio::spawn(async move {
                        handle_connection(stream, conn, worker_state).await;
                    });
                    state.registry.attach(&id, handle);
                }
            }
        }

        // drain and join the workers still in flight
        let handles = state.registry.drain_handles();
        debug!("joining {} in-flight workers", handles.len());
        for handle in handles {
            let _ = handle.await;
        }
        info!("server stopped");
    }
}

/// Shutdown handle: signals the accept loop and workers to stop.
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: watch::Sender<bool>,
}

impl ServerHandle {
    /// Signal shutdown. The accept loop stops taking new work, joins the
    /// tracked workers and releases the socket before `serve` returns.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}
