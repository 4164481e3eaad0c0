//! Response encoding.

use bytes::BytesMut;
use serde_json::{json, Value};

use crate::common::error::RequestError;
use crate::common::time::http_date;

/// Body of an outgoing response.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// JSON-encoded on the wire
    Structured(Value),
    /// Sent verbatim (hex ciphertext in secure mode)
    Raw(String),
}

/// An outgoing response.
///
/// Defaults to status 200 with the `{"status": "ok"}` body; the router
/// replaces the body with the wrapped handler result.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: u16,
    pub body: ResponseBody,
    /// Handler-supplied headers appended after the standard set
    pub headers: Vec<(String, String)>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: ResponseBody::Structured(json!({"status": "ok"})),
            headers: Vec::new(),
        }
    }
}

/// Reason phrase for the small fixed set of status codes in use.
fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl Response {
    /// Build the taxonomy response for a request error. The error's status
    /// code is carried on the status line.
    pub fn from_error(e: &RequestError) -> Response {
        Response {
            status: e.status_code(),
            body: ResponseBody::Structured(e.to_value()),
            headers: Vec::new(),
        }
    }

    /// Serialize the body to its wire form. An empty structured object
    /// serializes to an empty body.
    fn body_string(&self) -> String {
        match &self.body {
            ResponseBody::Structured(v) => {
                if v.as_object().is_some_and(|o| o.is_empty()) {
                    String::new()
                } else {
                    v.to_string()
                }
            }
            ResponseBody::Raw(s) => s.clone(),
        }
    }

    /// Encode the full response frame. Exactly one write per request; no
    /// chunked or streamed responses.
    pub fn encode(&self, server_name: &str) -> BytesMut {
        let body = self.body_string();

        let mut head = vec![
            format!("HTTP/1.1 {} {}", self.status, status_reason(self.status)),
            "Content-Type: application/json".to_string(),
            format!("Content-Length: {}", body.len()),
            format!("Date: {}", http_date()),
            format!("Server: {}", server_name),
            "Connection: close".to_string(),
            "Access-Control-Allow-Origin: *".to_string(),
            "Access-Control-Allow-Headers: *".to_string(),
            "Access-Control-Allow-Methods: *".to_string(),
        ];
        for (k, v) in &self.headers {
            head.push(format!("{}: {}", k, v));
        }

        let mut buf = BytesMut::with_capacity(head.len() * 32 + body.len() + 4);
        buf.extend_from_slice(head.join("\r\n").as_bytes());
        buf.extend_from_slice(b"\r\n\r\n");
        buf.extend_from_slice(body.as_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_body_and_status_line() {
        let resp = Response::default();
        let wire = resp.encode("kresnik");
        let text = std::str::from_utf8(&wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("{\"status\":\"ok\"}"));
        assert!(text.contains("\r\nServer: kresnik\r\n"));
        assert!(text.contains("\r\nConnection: close\r\n"));
        assert!(text.contains("\r\nAccess-Control-Allow-Origin: *\r\n"));
    }

    #[test]
    fn unknown_status_reason() {
        let resp = Response {
            status: 418,
            ..Response::default()
        };
        let wire = resp.encode("kresnik");
        assert!(wire.starts_with(b"HTTP/1.1 418 Unknown\r\n"));
    }

    #[test]
    fn content_length_matches_body() {
        let resp = Response {
            body: ResponseBody::Raw("abcdef".into()),
            ..Response::default()
        };
        let text = String::from_utf8(resp.encode("k").to_vec()).unwrap();
        assert!(text.contains("\r\nContent-Length: 6\r\n"));
        assert!(text.ends_with("\r\n\r\nabcdef"));
    }

    #[test]
    fn empty_object_body_is_empty_string() {
        let resp = Response {
            body: ResponseBody::Structured(json!({})),
            ..Response::default()
        };
        let text = String::from_utf8(resp.encode("k").to_vec()).unwrap();
        assert!(text.contains("\r\nContent-Length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn handler_headers_are_appended() {
        let resp = Response {
            headers: vec![("X-Trace".into(), "abc".into())],
            ..Response::default()
        };
        let text = String::from_utf8(resp.encode("k").to_vec()).unwrap();
        assert!(text.contains("\r\nX-Trace: abc\r\n"));
    }

    #[test]
    fn error_response_carries_taxonomy_status() {
        let e = RequestError::NotFound("unknown endpoint".into());
        let resp = Response::from_error(&e);
        let text = String::from_utf8(resp.encode("k").to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("\"error\":\"NotFound\""));
        assert!(text.contains("\"ok\":false"));
    }
}
