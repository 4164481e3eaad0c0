//! Path-keyed routing with declarative parameter validation.
//!
//! Routes are built explicitly at startup: a path, an HTTP method, a
//! typed parameter schema and a handler value. The endpoint table is
//! immutable once the server starts accepting.

mod context;
mod params;

pub use context::{ConnInfo, Context};
pub use params::{validate, Args, ParamKind, ParamSource, ParamSpec};

use std::collections::HashMap;
use std::sync::Arc;

use log::*;
use serde_json::{json, Map, Value};

use crate::common::error::RequestError;
use crate::protocol::response::ResponseBody;
use crate::protocol::{Body, Method};

/// Handler signature: per-request context plus validated keyword
/// parameters, returning a plain structured value or a typed error.
pub type HandlerResult = Result<Value, RequestError>;

type HandlerFn = dyn Fn(&mut Context, Args) -> HandlerResult + Send + Sync;

/// A registered endpoint: path, method, parameter schema and handler.
#[derive(Clone)]
pub struct Route {
    path: String,
    method: Method,
    params: Vec<ParamSpec>,
    requires_auth: bool,
    handler: Arc<HandlerFn>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("requires_auth", &self.requires_auth)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn new(
        method: Method,
        path: &str,
        handler: impl Fn(&mut Context, Args) -> HandlerResult + Send + Sync + 'static,
    ) -> Route {
        Route {
            path: path.to_string(),
            method,
            params: Vec::new(),
            requires_auth: false,
            handler: Arc::new(handler),
        }
    }

    pub fn get(
        path: &str,
        handler: impl Fn(&mut Context, Args) -> HandlerResult + Send + Sync + 'static,
    ) -> Route {
        Route::new(Method::Get, path, handler)
    }

    pub fn post(
        path: &str,
        handler: impl Fn(&mut Context, Args) -> HandlerResult + Send + Sync + 'static,
    ) -> Route {
        Route::new(Method::Post, path, handler)
    }

    /// Declare a required parameter.
    pub fn param(mut self, name: &str, kind: ParamKind) -> Route {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
        });
        self
    }

    /// Declare an optional parameter substituted with null when absent.
    pub fn optional(mut self, name: &str, kind: ParamKind) -> Route {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required: false,
            default: None,
        });
        self
    }

    /// Declare an optional parameter with a default value.
    pub fn with_default(mut self, name: &str, kind: ParamKind, default: Value) -> Route {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            required: false,
            default: Some(default),
        });
        self
    }

    /// Require an `Authorization` header before parameter validation.
    pub fn authenticated(mut self) -> Route {
        self.requires_auth = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

/// Startup-populated mapping from path to route.
#[derive(Clone, Default)]
pub struct EndpointTable {
    routes: HashMap<String, Route>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. A duplicate path is logged and rejected; the
    /// existing registration stays in place.
    pub fn register(&mut self, route: Route) {
        if self.routes.contains_key(route.path()) {
            error!("path {} is already registered, ignoring", route.path());
            return;
        }
        debug!("registered {} {}", route.method(), route.path());
        self.routes.insert(route.path().to_string(), route);
    }

    /// Resolve a path to its route.
    pub fn lookup(&self, path: &str) -> Result<&Route, RequestError> {
        self.routes
            .get(path)
            .ok_or_else(|| RequestError::NotFound("unknown endpoint".into()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Run the full dispatch pipeline for a resolved route.
///
/// Enforces the declared method, validates parameters against the schema
/// and invokes the handler. The wrapped result is attached to the
/// context's response.
pub fn dispatch(route: &Route, ctx: &mut Context) -> Result<(), RequestError> {
    if ctx.request.method != route.method {
        return Err(RequestError::MethodNotAllowed(
            "request method is not allowed for this endpoint".into(),
        ));
    }

    if route.requires_auth {
        match ctx.request.header("Authorization") {
            Some(token) => ctx.auth_token = Some(token.to_string()),
            None => {
                return Err(RequestError::NotAuthenticated(
                    "an Authorization header must be passed for this endpoint".into(),
                ))
            }
        }
    }

    // GET reads the query component, everything else the parsed body
    let (input, source) = match ctx.request.method {
        Method::Get => {
            let map: Map<String, Value> = ctx
                .request
                .query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            (map, ParamSource::Query)
        }
        _ => match &ctx.request.body {
            Body::Structured(map) => (map.clone(), ParamSource::Body),
            Body::Opaque(_) => {
                return Err(RequestError::Malformed(
                    "request body was never decrypted".into(),
                ))
            }
        },
    };

    let args = validate(&route.params, &input, source)?;

    let value = (route.handler.as_ref())(ctx, args)?;
    let value = if value.is_null() { json!({}) } else { value };

    ctx.response.body = ResponseBody::Structured(json!({ "data": value, "ok": true }));
    Ok(())
}
