//! Encrypted session channel.
//!
//! This module contains:
//! - `dh`: Diffie-Hellman key agreement over a fixed prime group
//! - `cipher`: AES-256-ECB session cipher with PKCS#7 padding
//! - `session`: the per-client session key table
//!
//! The channel is bootstrapped by a POST to `/handshake` carrying the
//! client's public value in the `X-Client-Public-Key` header; that path is
//! the only one exempt from encryption and from the completed-handshake
//! check.

pub mod cipher;
pub mod dh;
pub mod session;

pub use cipher::SessionKey;
pub use session::SessionTable;

use log::*;
use serde_json::{json, Value};

use crate::common::error::RequestError;
use crate::metrics::METRICS;
use crate::protocol::PUBLIC_KEY_HEADER;
use crate::router::{Args, Context, Route};

/// Well-known path bootstrapping the key exchange.
pub const HANDSHAKE_PATH: &str = "/handshake";

/// Build the handshake route registered automatically in secure mode.
pub fn handshake_route() -> Route {
    Route::post(HANDSHAKE_PATH, handshake)
}

/// Handshake handler.
///
/// Reads the client's public value, derives the shared session key and
/// stores it in the session table, then answers with the server's own
/// public value.
fn handshake(ctx: &mut Context, _args: Args) -> Result<Value, RequestError> {
    let client_public = client_public_value(&ctx.request)?;

    let private = dh::generate_private_key();
    let shared = dh::shared_secret(client_public, private);
    let key = SessionKey::derive(shared);

    ctx.server.sessions.insert(client_public, key);
    METRICS.inc_handshakes();
    debug!(
        "handshake completed for public value {} from {}",
        client_public, ctx.conn.peer
    );

    Ok(json!({ "server_pk": dh::public_key(private) }))
}

/// Parse the client public value header off a request.
pub fn client_public_value(request: &crate::protocol::Request) -> Result<u64, RequestError> {
    let raw = request.header(PUBLIC_KEY_HEADER).ok_or_else(|| {
        RequestError::Malformed(format!(
            "a public key is required to communicate with this server; attach it via a {} header",
            PUBLIC_KEY_HEADER
        ))
    })?;

    raw.parse::<u64>()
        .map_err(|_| RequestError::Malformed("the public key header must be an integer".into()))
}
