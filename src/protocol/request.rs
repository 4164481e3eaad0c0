//! Request decoding.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::common::error::RequestError;

use super::PUBLIC_KEY_HEADER;

/// Standard HTTP verbs accepted on the request line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "OPTIONS" => Ok(Method::Options),
            "HEAD" => Ok(Method::Head),
            _ => Err(RequestError::Malformed(
                "malformed request, not a known method".into(),
            )),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body as seen by the dispatch pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Parsed form or JSON content
    Structured(Map<String, Value>),
    /// Encrypted payload pending decryption outside the codec
    Opaque(String),
}

impl Body {
    pub fn empty() -> Self {
        Body::Structured(Map::new())
    }
}

/// A decoded request.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Body,
}

impl Request {
    /// Case-sensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Decode a raw request frame.
    ///
    /// Fails with `MalformedRequest` when the request line does not split
    /// into exactly `METHOD PATH VERSION`, the method is unknown, or a
    /// header line cannot be split on `": "`.
    pub fn parse(raw: &str) -> Result<Request, RequestError> {
        let mut lines = raw.trim().split("\r\n");

        let request_line = lines
            .next()
            .ok_or_else(|| RequestError::Malformed("empty request".into()))?;

        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() != 3 {
            return Err(RequestError::Malformed(
                "malformed request line, expected METHOD PATH VERSION".into(),
            ));
        }

        let method: Method = parts[0].parse()?;
        let (path, query) = parse_target(parts[1])?;

        let mut headers = HashMap::new();
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }
            let Some((k, v)) = line.split_once(": ") else {
                return Err(RequestError::Malformed(format!(
                    "malformed header line: {:?}",
                    line
                )));
            };
            headers.insert(k.to_string(), v.to_string());
        }

        let body_lines: Vec<&str> = lines.collect();
        let body = parse_body(&headers, &body_lines)?;

        Ok(Request {
            method,
            path,
            headers,
            query,
            body,
        })
    }
}

/// Split the request target into path and percent-decoded query pairs.
fn parse_target(target: &str) -> Result<(String, HashMap<String, String>), RequestError> {
    let Some((path, rawq)) = target.split_once('?') else {
        return Ok((target.to_string(), HashMap::new()));
    };

    let mut query = HashMap::new();
    for pair in rawq.split('&') {
        if pair.is_empty() {
            continue;
        }
        let Some((k, v)) = pair.split_once('=') else {
            return Err(RequestError::Malformed(format!(
                "malformed query pair: {:?}",
                pair
            )));
        };
        query.insert(decode_component(k)?, decode_component(v)?);
    }

    Ok((path.to_string(), query))
}

fn decode_component(s: &str) -> Result<String, RequestError> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|_| RequestError::Malformed(format!("query component is not valid utf-8: {:?}", s)))
}

/// Interpret the body lines based on the headers.
///
/// An encrypted payload is kept opaque; `application/json` content is
/// parsed as a JSON object; anything else is read as `key=value` form
/// pairs, one per line.
fn parse_body(
    headers: &HashMap<String, String>,
    body_lines: &[&str],
) -> Result<Body, RequestError> {
    if headers.contains_key(PUBLIC_KEY_HEADER) {
        return Ok(Body::Opaque(body_lines.concat().trim().to_string()));
    }

    let joined = body_lines.join("\r\n");
    let joined = joined.trim();

    if headers.get("Content-Type").map(String::as_str) == Some("application/json") {
        if joined.is_empty() {
            return Ok(Body::empty());
        }
        let value: Value = serde_json::from_str(joined)
            .map_err(|e| RequestError::Malformed(format!("invalid json body: {}", e)))?;
        return match value {
            Value::Object(map) => Ok(Body::Structured(map)),
            _ => Err(RequestError::Malformed("json body must be an object".into())),
        };
    }

    let mut map = Map::new();
    for line in body_lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let Some((k, v)) = line.split_once('=') else {
            return Err(RequestError::Malformed(format!(
                "malformed form pair: {:?}",
                line
            )));
        };
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    Ok(Body::Structured(map))
}
