//! Router core: ordered route table, first-match dispatch and handler argument assembly.

use super::matcher::{ParamVec, RoutePattern};
use crate::request::Request;
use anyhow::Context;
use http::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// What a handler returns once its result has been serialised.
pub type HandlerResult = anyhow::Result<Value>;

/// Type-erased route handler.
pub type Handler = Arc<dyn Fn(HandlerArg) -> HandlerResult + Send + Sync>;

const NO_HANDLER_PREFIX: &str = "No handler for ";

/// The sentinel returned when no route matches. It always names the method and path.
#[must_use]
pub fn no_handler_message(method: &Method, path: &str) -> String {
    format!("{NO_HANDLER_PREFIX}{method} {path}")
}

/// Whether `value` is the "no handler" sentinel for `request`.
///
/// Only the exact message for this request's method and path counts, so a handler
/// that returns some other `"No handler for ..."` string is still a handler value.
#[must_use]
pub fn is_no_handler(value: &Value, request: &Request) -> bool {
    value
        .as_str()
        .and_then(|s| s.strip_prefix(NO_HANDLER_PREFIX))
        .and_then(|s| s.strip_prefix(request.method.as_str()))
        .and_then(|s| s.strip_prefix(' '))
        .is_some_and(|s| s == request.path)
}

/// Path parameters plus whichever request parts were present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamArg {
    pub params: ParamVec,
    pub query: Option<HashMap<String, String>>,
    pub headers: Option<HashMap<String, String>>,
    /// `Some(Value::Null)` when the request carried an explicit null body.
    pub body: Option<Value>,
}

/// The value a handler receives.
///
/// When the match produced no parameters and the request has no query, headers or
/// body, the handler gets the request's `arg` untouched ([`HandlerArg::Raw`]).
/// Otherwise it gets a [`ParamArg`] and `arg` is dropped, even if it was set.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerArg {
    /// The request's opaque `arg`. `None` means the request had none.
    Raw(Option<Value>),
    Params(ParamArg),
}

impl HandlerArg {
    /// Assemble the argument for a matched route.
    #[must_use]
    pub fn assemble(params: ParamVec, request: &Request) -> Self {
        let has_params = !params.is_empty();
        let has_query = !request.query.is_empty();
        let has_headers = !request.headers.is_empty();
        let has_body = request.body.is_some();

        if !(has_params || has_query || has_headers || has_body) {
            return HandlerArg::Raw(request.arg.clone());
        }

        HandlerArg::Params(ParamArg {
            params,
            query: has_query.then(|| request.query.clone()),
            headers: has_headers.then(|| request.headers.clone()),
            body: request.body.clone(),
        })
    }

    /// A path parameter. Duplicate names resolve to the last occurrence.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            HandlerArg::Params(p) => p
                .params
                .iter()
                .rfind(|(k, _)| k.as_ref() == name)
                .map(|(_, v)| v.as_str()),
            HandlerArg::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        match self {
            HandlerArg::Params(ParamArg { query: Some(q), .. }) => q.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// A header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            HandlerArg::Params(ParamArg {
                headers: Some(h), ..
            }) => h
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        match self {
            HandlerArg::Params(p) => p.body.as_ref(),
            HandlerArg::Raw(_) => None,
        }
    }

    /// The raw `arg`, only present for [`HandlerArg::Raw`].
    #[must_use]
    pub fn raw(&self) -> Option<&Value> {
        match self {
            HandlerArg::Raw(arg) => arg.as_ref(),
            HandlerArg::Params(_) => None,
        }
    }

    /// Render the argument as JSON: the raw arg (absent becomes `null`), or an object of
    /// the params followed by `query`, `headers` and `body` when present.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            HandlerArg::Raw(arg) => arg.clone().unwrap_or(Value::Null),
            HandlerArg::Params(p) => {
                let mut map = Map::new();
                for (name, value) in &p.params {
                    map.insert(name.to_string(), Value::String(value.clone()));
                }
                if let Some(query) = &p.query {
                    map.insert("query".to_string(), string_map(query));
                }
                if let Some(headers) = &p.headers {
                    map.insert("headers".to_string(), string_map(headers));
                }
                if let Some(body) = &p.body {
                    map.insert("body".to_string(), body.clone());
                }
                Value::Object(map)
            }
        }
    }
}

fn string_map(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// One registration: method, pattern and handler.
#[derive(Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: RoutePattern,
    handler: Handler,
}

impl RouteEntry {
    /// Run the handler with an already assembled argument.
    pub fn invoke(&self, arg: HandlerArg) -> HandlerResult {
        (self.handler)(arg)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Ordered route table. Entries are never removed or reordered; the first entry
/// whose method and pattern both match wins.
///
/// A router is an ordinary owned value. Each worker builds its own, so handler
/// state captured at construction time is private to that worker.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Append a route. Any serialisable return type is accepted; `()` becomes `null`.
    pub fn route<F, R>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerArg) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        let pattern_text = pattern.to_string();
        let handler: Handler = Arc::new(move |arg| {
            let out = handler(arg)?;
            serde_json::to_value(out)
                .with_context(|| format!("handler result for '{pattern_text}' is not serialisable"))
        });
        debug!(method = %method, pattern = %pattern, position = self.routes.len(), "Route registered");
        self.routes.push(RouteEntry {
            method,
            pattern: RoutePattern::parse(pattern),
            handler,
        });
        self
    }

    pub fn get<F, R>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerArg) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<F, R>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerArg) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<F, R>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerArg) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch<F, R>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerArg) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete<F, R>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(HandlerArg) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    /// Find the first entry matching `method` and `path`.
    ///
    /// Entries for other methods are skipped before any pattern work is done.
    #[must_use]
    pub fn find(&self, method: &Method, path: &str) -> Option<(&RouteEntry, ParamVec)> {
        self.routes
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| entry.pattern.match_path(path).map(|params| (entry, params)))
    }

    /// Route a request and run its handler.
    ///
    /// Returns the "no handler" sentinel when nothing matches. A handler error is
    /// returned as-is; callers that must survive handler faults catch it themselves.
    pub fn handle(&self, request: &Request) -> HandlerResult {
        let Some((entry, params)) = self.find(&request.method, &request.path) else {
            debug!(method = %request.method, path = %request.path, "No route matched");
            return Ok(Value::String(no_handler_message(
                &request.method,
                &request.path,
            )));
        };

        trace!(
            method = %request.method,
            path = %request.path,
            pattern = %entry.pattern,
            params = ?params,
            "Route matched"
        );
        entry.invoke(HandlerArg::assemble(params, request))
    }

    /// Normalise a loosely shaped request, then [`Router::handle`] it.
    pub fn handle_value(&self, raw: Value) -> HandlerResult {
        let request = Request::from_value(raw)?;
        self.handle(&request)
    }

    /// `(method, pattern)` pairs in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|e| (&e.method, e.pattern.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes).finish()
    }
}
