//! Per-connection worker.
//!
//! Each accepted connection runs exactly one request/response cycle:
//! read until the frame terminator, decode, (optionally) decrypt,
//! dispatch, (optionally) re-encrypt, write once, close.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use log::*;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::error::{ConnError, RequestError};
use crate::config::Limits;
use crate::metrics::METRICS;
use crate::protocol::response::ResponseBody;
use crate::protocol::{Body, Request, Response, FRAME_END};
use crate::router::{self, ConnInfo, Context};
use crate::secure::{self, cipher, SessionKey, HANDSHAKE_PATH};

use super::server::ServerState;

/// Drive one request/response cycle and deregister the connection.
pub async fn handle_connection(mut stream: TcpStream, conn: ConnInfo, state: Arc<ServerState>) {
    let conn_desc = conn.to_string();
    let id = conn.id.clone();
    let server_name = state.config.server.name.clone();

    match transact(&mut stream, conn, &state).await {
        Ok(bytes) => {
            METRICS.inc_ok_responses();
            if let Err(e) = stream.write_all(&bytes).await {
                debug!("failed to send response to {}: {}", conn_desc, e);
            }
        }
        Err(ConnError::Request(e)) => {
            match &e {
                // browsers probe with preflight requests; keep these quiet
                RequestError::MethodNotAllowed(_) => {}
                RequestError::Internal { .. } => error!("error handling {}: {}", conn_desc, e),
                _ => debug!("{} sent bad request: {}", conn_desc, e),
            }
            METRICS.inc_error_responses();
            let bytes = Response::from_error(&e).encode(&server_name);
            if let Err(werr) = stream.write_all(&bytes).await {
                debug!("failed to send error response to {}: {}", conn_desc, werr);
            }
        }
        Err(ConnError::Disconnected) => {
            METRICS.inc_disconnects();
            debug!("{} disconnected during recv", conn_desc);
        }
        Err(ConnError::Io(e)) => {
            debug!("socket error for {}: {}", conn_desc, e);
        }
    }

    let _ = stream.shutdown().await;
    state.registry.remove(&id);
    debug!("finished transaction with {}", conn_desc);
}

/// Read, decode, decrypt, dispatch and encode; returns the response bytes
/// ready for the single write.
async fn transact(
    stream: &mut TcpStream,
    conn: ConnInfo,
    state: &Arc<ServerState>,
) -> Result<BytesMut, ConnError> {
    let cfg = &state.config;

    let raw = read_all(stream, &cfg.limits).await?;
    let text = std::str::from_utf8(&raw)
        .map_err(|_| RequestError::Malformed("request is not valid utf-8".into()))?;

    let mut request = Request::parse(text)?;
    METRICS.inc_requests();

    // secure mode: bind the session key and decrypt before routing
    let mut session_key: Option<SessionKey> = None;
    if cfg.server.secure {
        let client_public = secure::client_public_value(&request)?;

        if request.path == HANDSHAKE_PATH {
            // the public value travels in the header; the body plays no part
            request.body = Body::empty();
        } else {
            let key = state.sessions.get(client_public).ok_or_else(|| {
                RequestError::Malformed(
                    "you must complete the handshake via /handshake before sending requests".into(),
                )
            })?;

            let ciphertext = match &request.body {
                Body::Opaque(s) => s.as_str(),
                Body::Structured(_) => "",
            };
            let plaintext = cipher::decrypt(ciphertext, &key).map_err(RequestError::from)?;
            let value: Value = serde_json::from_str(&plaintext).map_err(|_| {
                RequestError::Malformed("decrypted body is not valid json".into())
            })?;
            let map = match value {
                Value::Object(map) => map,
                _ => {
                    return Err(RequestError::Malformed(
                        "decrypted body must be a json object".into(),
                    )
                    .into())
                }
            };
            request.body = Body::Structured(map);
            session_key = Some(key);
        }
    }

    let mut ctx = Context::new(request, conn, state.clone());
    state.hooks.before_handle(&mut ctx)?;

    let route = state.endpoints.lookup(&ctx.request.path)?;
    debug!(
        "[{} {} for {}] dispatching",
        ctx.request.method, ctx.request.path, ctx.conn
    );
    router::dispatch(route, &mut ctx)?;

    state.hooks.after_handle(&ctx);
    let response = std::mem::take(&mut ctx.response);
    let mut response = state.hooks.override_response(&ctx, response);

    // re-encrypt the body under the same session key
    if let Some(key) = session_key {
        let plaintext = match &response.body {
            ResponseBody::Structured(v) => v.to_string(),
            ResponseBody::Raw(s) => s.clone(),
        };
        response.body = ResponseBody::Raw(cipher::encrypt(&plaintext, &key));
    }

    Ok(response.encode(&cfg.server.name))
}

/// Accumulate request bytes until the frame terminator.
///
/// A read timeout means no more data is currently available and ends the
/// loop; a zero-length read means the peer disconnected. Oversized input
/// is a malformed request.
async fn read_all(stream: &mut TcpStream, limits: &Limits) -> Result<BytesMut, ConnError> {
    let mut data = BytesMut::new();
    let mut chunk = vec![0u8; limits.read_chunk_bytes];
    let per_read = Duration::from_millis(limits.read_timeout_ms);

    loop {
        match timeout(per_read, stream.read(&mut chunk)).await {
            // no more data right now
            Err(_) => break,
            Ok(Ok(0)) => return Err(ConnError::Disconnected),
            Ok(Ok(n)) => {
                data.extend_from_slice(&chunk[..n]);
                if data.len() > limits.max_request_bytes {
                    return Err(
                        RequestError::Malformed("request exceeds the size limit".into()).into(),
                    );
                }
                if data.ends_with(FRAME_END) {
                    break;
                }
            }
            Ok(Err(e)) => return Err(ConnError::Io(e)),
        }
    }

    if data.is_empty() {
        return Err(ConnError::Disconnected);
    }

    Ok(data)
}
