//! Session key table shared across connection workers.

use std::collections::HashMap;
use std::sync::Mutex;

use log::*;

use super::cipher::SessionKey;

/// Mutex-guarded map from a client public value to its derived session
/// key. Entries are created by a successful handshake and live for the
/// server process lifetime; there is no expiry.
#[derive(Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<u64, SessionKey>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the derived key for a client public value. A repeated
    /// handshake from the same public value replaces the old key.
    pub fn insert(&self, client_public: u64, key: SessionKey) {
        let mut inner = self.lock();
        if inner.insert(client_public, key).is_some() {
            debug!("replaced session key for public value {}", client_public);
        }
    }

    /// Look up the session key bound to a client public value.
    pub fn get(&self, client_public: u64) -> Option<SessionKey> {
        self.lock().get(&client_public).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, SessionKey>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
