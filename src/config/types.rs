//! Configuration type definitions.

/// Server bind and mode configuration.
#[derive(Clone, Debug)]
pub struct ServerCfg {
    pub host: String,
    pub port: u16,
    /// Name advertised in the `Server` response header
    pub name: String,
    /// Enable the encrypted session channel
    pub secure: bool,
    /// Raise default log verbosity to debug
    pub debug: bool,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            name: "kresnik".into(),
            secure: false,
            debug: false,
        }
    }
}

/// Connection and resource limits.
#[derive(Clone, Debug)]
pub struct Limits {
    /// Listen backlog handed to the OS
    pub backlog: i32,
    /// Hard cap on simultaneously tracked connections
    pub max_active_conns: usize,
    /// Read chunk size for the accumulation loop
    pub read_chunk_bytes: usize,
    /// Per-read timeout; expiry means "no more data right now"
    pub read_timeout_ms: u64,
    /// Upper bound on a single accumulated request
    pub max_request_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            backlog: 50,
            max_active_conns: 1000,
            read_chunk_bytes: 1024,
            read_timeout_ms: 10,
            max_request_bytes: 1024 * 1024,
        }
    }
}

/// Application secrets passed through to handlers.
#[derive(Clone, Debug, Default)]
pub struct Secrets {
    pub password_salt: String,
}

/// Root configuration container.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub server: ServerCfg,
    pub limits: Limits,
    pub secrets: Secrets,
}
