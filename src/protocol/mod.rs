//! Wire protocol for the HTTP-like exchange.
//!
//! This module contains:
//! - `request`: decoding raw bytes into a `Request`
//! - `response`: encoding a `Response` back onto the wire
//!
//! Framing is sentinel based: a request is complete once the accumulated
//! bytes end with `\r\n\r\n`. Bodies are small structured payloads, never
//! streamed content.

pub mod request;
pub mod response;

pub use request::{Body, Method, Request};
pub use response::{Response, ResponseBody};

/// Header carrying the client's public value in secure mode. Its presence
/// also marks the request body as an opaque encrypted blob.
pub const PUBLIC_KEY_HEADER: &str = "X-Client-Public-Key";

/// Byte sequence marking the end of a request frame.
pub const FRAME_END: &[u8] = b"\r\n\r\n";
