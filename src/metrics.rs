//! Global traffic metrics using atomic counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics structure.
#[derive(Default)]
pub struct Metrics {
    /// Connections accepted and handed to a worker
    pub accepted: AtomicU64,
    /// Connections closed immediately because the server was full
    pub rejected_full: AtomicU64,
    /// Requests that reached the dispatch pipeline
    pub requests: AtomicU64,
    /// Responses answered with `ok: true`
    pub ok_responses: AtomicU64,
    /// Responses answered through the error taxonomy
    pub error_responses: AtomicU64,
    /// Peers that disconnected mid-read
    pub disconnects: AtomicU64,
    /// Completed key handshakes
    pub handshakes: AtomicU64,
}

/// Global metrics singleton.
pub static METRICS: once_cell::sync::Lazy<&'static Metrics> =
    once_cell::sync::Lazy::new(|| Box::leak(Box::new(Metrics::default())));

/// Point-in-time copy of all counters for logging.
#[derive(Serialize)]
pub struct Snapshot {
    pub accepted: u64,
    pub rejected_full: u64,
    pub requests: u64,
    pub ok_responses: u64,
    pub error_responses: u64,
    pub disconnects: u64,
    pub handshakes: u64,
}

impl Metrics {
    pub fn inc_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ok_responses(&self) {
        self.ok_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_error_responses(&self) {
        self.error_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_disconnects(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_handshakes(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters for a shutdown summary.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            ok_responses: self.ok_responses.load(Ordering::Relaxed),
            error_responses: self.error_responses.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            handshakes: self.handshakes.load(Ordering::Relaxed),
        }
    }
}
