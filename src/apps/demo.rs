//! The `demo` application: greetings, a CPU-bound fibonacci, query/header/body
//! examples and a small CRUD surface over `/users`.

use crate::router::{HandlerArg, Router};
use anyhow::{anyhow, bail, Result};
use serde_json::Value;

pub fn build() -> Router {
    let mut router = Router::new();
    router
        .get("/hello/:name", hello)
        .get("/fibonacci/:n", fibonacci)
        .get("/search", search)
        .get("/filter", filter)
        .get("/user/:id", user)
        .post("/users", create_user)
        .post("/api/calculate", calculate)
        .put("/users/:id", update_user)
        .patch("/users/:id", patch_user)
        .delete("/users/:id", delete_user)
        .get("/protected", protected);
    router
}

fn hello(arg: HandlerArg) -> Result<String> {
    Ok(format!("Hello, {}!", arg.param("name").unwrap_or_default()))
}

fn fib(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }
    fib(n - 1) + fib(n - 2)
}

fn fibonacci(arg: HandlerArg) -> Result<String> {
    let raw = arg.param("n").unwrap_or_default();
    let n: u64 = raw
        .parse()
        .map_err(|_| anyhow!("'{raw}' is not a non-negative integer"))?;
    if n > 92 {
        bail!("fibonacci of {n} does not fit in 64 bits");
    }
    Ok(format!("Fibonacci of {n} is {}", fib(n)))
}

fn search(arg: HandlerArg) -> Result<String> {
    Ok(format!("Search results for: {}", arg.query("q").unwrap_or("")))
}

fn filter(arg: HandlerArg) -> Result<String> {
    Ok(format!(
        "Sort: {}, Limit: {}",
        arg.query("sort").unwrap_or("none"),
        arg.query("limit").unwrap_or("none")
    ))
}

fn user(arg: HandlerArg) -> Result<String> {
    Ok(format!(
        "User {} in {} format",
        arg.param("id").unwrap_or_default(),
        arg.query("format").unwrap_or("html")
    ))
}

/// Render a body field the way string interpolation would: strings bare, other
/// values as JSON, missing fields as `undefined`.
fn field_text(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    }
}

fn require_body(arg: &HandlerArg) -> Result<&Value> {
    arg.body().ok_or_else(|| anyhow!("request body is required"))
}

fn create_user(arg: HandlerArg) -> Result<String> {
    let body = require_body(&arg)?;
    Ok(format!(
        "Created user: {} ({})",
        field_text(body, "name"),
        field_text(body, "email")
    ))
}

/// Format a number without a trailing `.0` when it is integral.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn calculate(arg: HandlerArg) -> Result<String> {
    let body = require_body(&arg)?;
    let operand = |key: &str| {
        body.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| anyhow!("'{key}' must be a number"))
    };
    let (a, b) = (operand("a")?, operand("b")?);

    let result = match body.get("operation").and_then(Value::as_str) {
        Some("add") => a + b,
        Some("multiply") => a * b,
        Some("subtract") => a - b,
        Some("divide") => a / b,
        _ => 0.0,
    };
    Ok(format!("Result: {}", format_number(result)))
}

fn body_json(arg: &HandlerArg) -> String {
    arg.body()
        .map_or_else(|| "undefined".to_string(), Value::to_string)
}

fn update_user(arg: HandlerArg) -> Result<String> {
    Ok(format!(
        "Updated user {} with data: {}",
        arg.param("id").unwrap_or_default(),
        body_json(&arg)
    ))
}

fn patch_user(arg: HandlerArg) -> Result<String> {
    Ok(format!(
        "Patched user {} with: {}",
        arg.param("id").unwrap_or_default(),
        body_json(&arg)
    ))
}

fn delete_user(arg: HandlerArg) -> Result<String> {
    Ok(format!("Deleted user {}", arg.param("id").unwrap_or_default()))
}

fn protected(arg: HandlerArg) -> Result<String> {
    match arg.header("authorization").and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => Ok(format!("Access granted with token: {token}")),
        None => Ok("Unauthorized".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use http::Method;
    use serde_json::json;

    fn call(req: Request) -> Value {
        build().handle(&req).unwrap()
    }

    #[test]
    fn test_hello_and_fibonacci() {
        assert_eq!(call(Request::new("/hello/World")), "Hello, World!");
        assert_eq!(call(Request::new("/fibonacci/10")), "Fibonacci of 10 is 55");
        assert!(build().handle(&Request::new("/fibonacci/abc")).is_err());
    }

    #[test]
    fn test_query_routes() {
        let req = Request::new("/filter").with_query("sort", "asc");
        assert_eq!(call(req), "Sort: asc, Limit: none");
        let req = Request::new("/user/9").with_query("format", "json");
        assert_eq!(call(req), "User 9 in json format");
        assert_eq!(call(Request::new("/user/9")), "User 9 in html format");
    }

    #[test]
    fn test_create_user() {
        let req = Request::new("/users")
            .with_method(Method::POST)
            .with_body(json!({"name": "Alice", "email": "a@x.com"}));
        assert_eq!(call(req), "Created user: Alice (a@x.com)");
    }

    #[test]
    fn test_calculate() {
        let calc = |a: f64, b: f64, op: &str| {
            call(
                Request::new("/api/calculate")
                    .with_method(Method::POST)
                    .with_body(json!({"a": a, "b": b, "operation": op})),
            )
        };
        assert_eq!(calc(2.0, 3.0, "add"), "Result: 5");
        assert_eq!(calc(5.0, 2.0, "divide"), "Result: 2.5");
        assert_eq!(calc(1.0, 0.0, "divide"), "Result: Infinity");
        assert_eq!(calc(1.0, 2.0, "modulo"), "Result: 0");
    }

    #[test]
    fn test_crud_by_method() {
        let body = json!({"name": "Bob"});
        let put = Request::new("/users/3")
            .with_method(Method::PUT)
            .with_body(body.clone());
        assert_eq!(call(put), r#"Updated user 3 with data: {"name":"Bob"}"#);

        let patch = Request::new("/users/3")
            .with_method(Method::PATCH)
            .with_body(body);
        assert_eq!(call(patch), r#"Patched user 3 with: {"name":"Bob"}"#);

        let delete = Request::new("/users/3").with_method(Method::DELETE);
        assert_eq!(call(delete), "Deleted user 3");
    }

    #[test]
    fn test_protected() {
        assert_eq!(call(Request::new("/protected")), "Unauthorized");
        let req = Request::new("/protected").with_header("authorization", "Basic abc");
        assert_eq!(call(req), "Unauthorized");
        let req = Request::new("/protected").with_header("authorization", "Bearer abc123");
        assert_eq!(call(req), "Access granted with token: abc123");
    }
}
