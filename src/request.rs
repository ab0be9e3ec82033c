//! The abstract request consumed by the router and the worker pool.
//!
//! A [`Request`] is either built explicitly or normalised from a loosely shaped JSON
//! object (`{"path": "/x", "method": "post", "query": {...}, ...}`). Only `path` is
//! required. `body` and `arg` keep the difference between an absent field and an
//! explicit `null`, because the router's argument assembly depends on it.

use crate::error::RequestError;
use http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One incoming call, already translated from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub path: String,
    pub method: Method,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    /// `Some(Value::Null)` is an explicit null body, `None` means no body.
    pub body: Option<Value>,
    /// Opaque argument, only seen by handlers when nothing else is present.
    pub arg: Option<Value>,
}

impl Request {
    /// A GET request for `path` with no query, headers, body or arg.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            query: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            arg: None,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }

    /// Normalise a loosely shaped JSON object into a request.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let Value::Object(mut obj) = value else {
            return Err(RequestError::NotAnObject);
        };

        let path = match obj.remove("path") {
            Some(Value::String(path)) => path,
            Some(_) => {
                return Err(RequestError::InvalidField {
                    field: "path",
                    expected: "a string",
                })
            }
            None => return Err(RequestError::MissingPath),
        };

        let method = match obj.remove("method") {
            None | Some(Value::Null) => Method::GET,
            Some(Value::String(m)) => parse_method(&m)?,
            Some(_) => {
                return Err(RequestError::InvalidField {
                    field: "method",
                    expected: "a string",
                })
            }
        };

        let query = flatten_map("query", obj.remove("query"))?;
        let headers = flatten_map("headers", obj.remove("headers"))?;

        Ok(Self {
            path,
            method,
            query,
            headers,
            body: obj.remove("body"),
            arg: obj.remove("arg"),
        })
    }
}

impl TryFrom<Value> for Request {
    type Error = RequestError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Upper-case and parse an HTTP method token.
pub fn parse_method(raw: &str) -> Result<Method, RequestError> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| RequestError::InvalidMethod(raw.to_string()))
}

/// Turn an optional JSON object into flat string pairs. Non-string scalars are
/// stringified; nested values are rendered as JSON text.
fn flatten_map(
    field: &'static str,
    value: Option<Value>,
) -> Result<HashMap<String, String>, RequestError> {
    match value {
        None | Some(Value::Null) => Ok(HashMap::new()),
        Some(Value::Object(map)) => Ok(flatten_object(map)),
        Some(_) => Err(RequestError::InvalidField {
            field,
            expected: "an object",
        }),
    }
}

fn flatten_object(map: Map<String, Value>) -> HashMap<String, String> {
    map.into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let req = Request::new("/test");
        assert_eq!(req.path, "/test");
        assert_eq!(req.method, Method::GET);
        assert!(req.query.is_empty());
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
        assert!(req.arg.is_none());
    }

    #[test]
    fn test_from_value_full() {
        let req = Request::from_value(json!({
            "path": "/api/users",
            "method": "post",
            "query": {"key": "value", "limit": 10},
            "headers": {"content-type": "application/json"},
            "body": {"name": "test"},
            "arg": "data"
        }))
        .unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.query.get("key").map(String::as_str), Some("value"));
        assert_eq!(req.query.get("limit").map(String::as_str), Some("10"));
        assert_eq!(
            req.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(req.body, Some(json!({"name": "test"})));
        assert_eq!(req.arg, Some(json!("data")));
    }

    #[test]
    fn test_from_value_keeps_explicit_null() {
        let req = Request::from_value(json!({"path": "/x", "body": null, "arg": null})).unwrap();
        assert_eq!(req.body, Some(Value::Null));
        assert_eq!(req.arg, Some(Value::Null));

        let req = Request::from_value(json!({"path": "/x"})).unwrap();
        assert_eq!(req.body, None);
        assert_eq!(req.arg, None);
    }

    #[test]
    fn test_from_value_errors() {
        assert_eq!(
            Request::from_value(json!({"method": "GET"})),
            Err(RequestError::MissingPath)
        );
        assert_eq!(
            Request::from_value(json!("just a string")),
            Err(RequestError::NotAnObject)
        );
        assert!(matches!(
            Request::from_value(json!({"path": "/x", "query": "q=1"})),
            Err(RequestError::InvalidField { field: "query", .. })
        ));
        assert!(matches!(
            Request::from_value(json!({"path": "/x", "method": "GET /"})),
            Err(RequestError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_parse_method_normalises_case() {
        assert_eq!(parse_method("delete").unwrap(), Method::DELETE);
        assert_eq!(parse_method("Patch").unwrap(), Method::PATCH);
    }
}
