//! Active-connection registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinHandle;

struct ConnEntry {
    #[allow(dead_code)]
    peer: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

/// Mutex-guarded map of currently active connections, keyed by the
/// generated connection id. The accept loop consults `len()` for load
/// shedding; workers deregister themselves when their cycle ends.
#[derive(Default)]
pub struct ConnRegistry {
    inner: Mutex<HashMap<String, ConnEntry>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Track a connection before its worker is spawned, so the cap
    /// accounts for it immediately.
    pub fn insert(&self, id: &str, peer: SocketAddr) {
        self.lock()
            .insert(id.to_string(), ConnEntry { peer, handle: None });
    }

    /// Attach the worker handle once spawned. A no-op if the worker
    /// already finished and removed itself.
    pub fn attach(&self, id: &str, handle: JoinHandle<()>) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.handle = Some(handle);
        }
    }

    /// Remove a finished connection.
    pub fn remove(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Take every tracked worker handle for joining at shutdown.
    pub fn drain_handles(&self) -> Vec<JoinHandle<()>> {
        self.lock()
            .drain()
            .filter_map(|(_, entry)| entry.handle)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConnEntry>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
