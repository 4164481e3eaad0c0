//! Unified error types for the kresnik codebase.

use std::fmt;
use std::io;

use serde_json::{json, Value};

/// Error type for request handling across the codec, router and server.
///
/// Each variant maps to an HTTP status code and a stable kind string that
/// is sent back to the peer in the `error` field of the response body.
#[derive(Debug, Clone)]
pub enum RequestError {
    /// Raw bytes or headers could not be parsed
    Malformed(String),
    /// One or more required parameters are absent
    MissingParameters(String),
    /// One or more parameters failed type/format validation
    BadParameters(String),
    /// No handler is registered for the path
    NotFound(String),
    /// A handler exists but its declared method differs
    MethodNotAllowed(String),
    /// Required authentication proof is absent or invalid
    NotAuthenticated(String),
    /// Any other failure raised by a handler, tagged with the
    /// classification of the original error
    Internal { class: String, message: String },
}

impl RequestError {
    /// Wrap a foreign error under the given classification name.
    pub fn internal(class: &str, message: impl fmt::Display) -> Self {
        RequestError::Internal {
            class: class.to_string(),
            message: message.to_string(),
        }
    }

    /// HTTP status code carried on the wire for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::Malformed(_) => 400,
            RequestError::MissingParameters(_) => 400,
            RequestError::BadParameters(_) => 400,
            RequestError::NotFound(_) => 404,
            RequestError::MethodNotAllowed(_) => 405,
            RequestError::NotAuthenticated(_) => 401,
            RequestError::Internal { .. } => 500,
        }
    }

    /// Stable kind string sent to the peer.
    pub fn kind(&self) -> &str {
        match self {
            RequestError::Malformed(_) => "MalformedRequest",
            RequestError::MissingParameters(_) => "MissingParameters",
            RequestError::BadParameters(_) => "BadParameters",
            RequestError::NotFound(_) => "NotFound",
            RequestError::MethodNotAllowed(_) => "MethodNotAllowed",
            RequestError::NotAuthenticated(_) => "NotAuthenticated",
            RequestError::Internal { class, .. } => class,
        }
    }

    /// Human-readable detail message.
    pub fn message(&self) -> &str {
        match self {
            RequestError::Malformed(m)
            | RequestError::MissingParameters(m)
            | RequestError::BadParameters(m)
            | RequestError::NotFound(m)
            | RequestError::MethodNotAllowed(m)
            | RequestError::NotAuthenticated(m) => m,
            RequestError::Internal { message, .. } => message,
        }
    }

    /// Body object sent to the peer for this error.
    pub fn to_value(&self) -> Value {
        json!({
            "error": self.kind(),
            "message": self.message(),
            "ok": false,
        })
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for RequestError {}

impl From<StorageError> for RequestError {
    fn from(e: StorageError) -> Self {
        RequestError::internal("StorageError", e)
    }
}

impl From<CipherError> for RequestError {
    fn from(e: CipherError) -> Self {
        RequestError::Malformed(e.to_string())
    }
}

/// Error type for session-cipher operations.
#[derive(Debug)]
pub enum CipherError {
    /// Ciphertext is not valid hex or has a broken block length
    Encoding,
    /// PKCS#7 padding check failed after decryption
    Padding,
    /// Decrypted bytes are not valid UTF-8
    Utf8,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherError::Encoding => write!(f, "ciphertext is not a valid hex block sequence"),
            CipherError::Padding => write!(f, "ciphertext padding is invalid"),
            CipherError::Utf8 => write!(f, "decrypted payload is not valid utf-8"),
        }
    }
}

impl std::error::Error for CipherError {}

/// Error type for the storage collaborator seam.
#[derive(Debug)]
pub enum StorageError {
    /// The underlying store rejected or failed the operation
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Backend(m) => write!(f, "storage backend error: {}", m),
        }
    }
}

impl std::error::Error for StorageError {}

/// Outcome of a connection worker that did not produce a response.
#[derive(Debug)]
pub enum ConnError {
    /// Peer closed the socket mid-read; no response is possible
    Disconnected,
    /// Socket-level failure
    Io(io::Error),
    /// Typed request failure answered via the error taxonomy
    Request(RequestError),
}

impl fmt::Display for ConnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnError::Disconnected => write!(f, "peer disconnected during recv"),
            ConnError::Io(e) => write!(f, "socket error: {}", e),
            ConnError::Request(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnError::Io(e) => Some(e),
            ConnError::Request(e) => Some(e),
            ConnError::Disconnected => None,
        }
    }
}

impl From<io::Error> for ConnError {
    fn from(e: io::Error) -> Self {
        ConnError::Io(e)
    }
}

impl From<RequestError> for ConnError {
    fn from(e: RequestError) -> Self {
        ConnError::Request(e)
    }
}
