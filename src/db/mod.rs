//! Persistence collaborator seam.
//!
//! The core never talks to a concrete store; it consumes a generic
//! execute/query interface. The underlying store is not safe for
//! concurrent access, so the shared handle serializes every call behind a
//! single mutex held for the duration of the operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::common::error::StorageError;

/// A single result row: column name to value.
pub type Row = Map<String, Value>;

/// Generic execute/query interface implemented by the persistence
/// collaborator. Statements that return no rows yield an empty vec.
pub trait Storage: Send {
    fn execute(&mut self, query: &str, params: &[Value]) -> Result<Vec<Row>, StorageError>;
}

/// Shared, mutex-serialized handle to the storage collaborator.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<Box<dyn Storage>>>,
}

impl SharedStorage {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(storage))),
        }
    }

    /// Run a statement while holding the storage lock.
    pub fn execute(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
        self.lock().execute(query, params)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Storage>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// In-memory storage used by tests and the bundled demo binary: rows are
/// keyed by the literal query string, and every executed statement is
/// recorded.
#[derive(Default)]
pub struct MemoryStorage {
    rows: HashMap<String, Vec<Row>>,
    pub executed: Vec<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload the rows returned for a given query.
    pub fn preload(&mut self, query: &str, rows: Vec<Row>) {
        self.rows.insert(query.to_string(), rows);
    }
}

impl Storage for MemoryStorage {
    fn execute(&mut self, query: &str, _params: &[Value]) -> Result<Vec<Row>, StorageError> {
        self.executed.push(query.to_string());
        Ok(self.rows.get(query).cloned().unwrap_or_default())
    }
}
