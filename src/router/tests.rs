use super::{is_no_handler, HandlerArg, Router};
use crate::request::Request;
use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Router whose single route echoes its rendered argument.
fn echo_router(method: Method, pattern: &str) -> Router {
    let mut router = Router::new();
    router.route(method, pattern, |arg: HandlerArg| Ok(arg.to_value()));
    router
}

#[test]
fn test_static_route() {
    let mut router = Router::new();
    router.get("/hello", |_| Ok("Hello, World!"));
    assert_eq!(router.handle(&Request::new("/hello")).unwrap(), "Hello, World!");
}

#[test]
fn test_path_param_argument() {
    let router = echo_router(Method::GET, "/hello/:name");
    let out = router.handle(&Request::new("/hello/World")).unwrap();
    assert_eq!(out, json!({"name": "World"}));
}

#[test]
fn test_raw_arg_passed_when_nothing_else_present() {
    let mut router = Router::new();
    router.get("/process", |arg: HandlerArg| {
        Ok(format!("Processed: {}", arg.raw().and_then(Value::as_str).unwrap_or("")))
    });
    let req = Request::new("/process").with_arg(json!("test data"));
    assert_eq!(router.handle(&req).unwrap(), "Processed: test data");
}

#[test]
fn test_absent_arg_differs_from_null_arg() {
    let mut router = Router::new();
    router.get("/probe", |arg: HandlerArg| {
        Ok(match arg {
            HandlerArg::Raw(None) => "absent",
            HandlerArg::Raw(Some(Value::Null)) => "null",
            _ => "other",
        })
    });
    assert_eq!(router.handle(&Request::new("/probe")).unwrap(), "absent");
    let req = Request::new("/probe").with_arg(Value::Null);
    assert_eq!(router.handle(&req).unwrap(), "null");
}

#[test]
fn test_params_discard_arg() {
    let router = echo_router(Method::GET, "/user/:id");
    let req = Request::new("/user/7").with_arg(json!({"leak": true}));
    let out = router.handle(&req).unwrap();
    assert_eq!(out, json!({"id": "7"}));
}

#[test]
fn test_query_discards_arg_on_static_route() {
    let router = echo_router(Method::GET, "/search");
    let req = Request::new("/search")
        .with_query("q", "test")
        .with_arg(json!("ignored"));
    assert_eq!(router.handle(&req).unwrap(), json!({"query": {"q": "test"}}));
}

#[test]
fn test_search_query() {
    let mut router = Router::new();
    router.get("/search", |arg: HandlerArg| {
        Ok(format!("Search results for: {}", arg.query("q").unwrap_or("")))
    });
    let req = Request::new("/search").with_query("q", "test");
    assert_eq!(router.handle(&req).unwrap(), "Search results for: test");
}

#[test]
fn test_post_body_argument_and_method_mismatch() {
    let router = echo_router(Method::POST, "/users");
    let body = json!({"name": "Alice", "email": "a@x.com"});
    let req = Request::new("/users")
        .with_method(Method::POST)
        .with_body(body.clone());
    assert_eq!(router.handle(&req).unwrap(), json!({"body": body}));

    let get = Request::new("/users");
    let out = router.handle(&get).unwrap();
    assert_eq!(out, "No handler for GET /users");
    assert!(is_no_handler(&out, &get));
    assert!(!is_no_handler(&out, &req));
}

#[test]
fn test_explicit_null_body_counts_as_present() {
    let router = echo_router(Method::POST, "/submit");
    let req = Request::new("/submit")
        .with_method(Method::POST)
        .with_body(Value::Null)
        .with_arg(json!("dropped"));
    assert_eq!(router.handle(&req).unwrap(), json!({"body": null}));
}

#[test]
fn test_all_parts_merged() {
    let router = echo_router(Method::PUT, "/users/:id");
    let req = Request::new("/users/5")
        .with_method(Method::PUT)
        .with_query("dry", "1")
        .with_header("authorization", "Bearer t")
        .with_body(json!({"name": "Bob"}));
    assert_eq!(
        router.handle(&req).unwrap(),
        json!({
            "id": "5",
            "query": {"dry": "1"},
            "headers": {"authorization": "Bearer t"},
            "body": {"name": "Bob"}
        })
    );
}

#[test]
fn test_header_lookup_is_case_insensitive() {
    let mut router = Router::new();
    router.get("/protected", |arg: HandlerArg| {
        Ok(arg.header("Authorization").unwrap_or("none").to_string())
    });
    let req = Request::new("/protected").with_header("authorization", "Bearer abc");
    assert_eq!(router.handle(&req).unwrap(), "Bearer abc");
}

#[test]
fn test_first_match_wins() {
    let second_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&second_calls);

    let mut router = Router::new();
    router.get("/dup", |_| Ok("first"));
    router.get("/dup", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("second")
    });

    for _ in 0..3 {
        assert_eq!(router.handle(&Request::new("/dup")).unwrap(), "first");
    }
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_registration_order_beats_specificity() {
    let mut router = Router::new();
    router.get("/user/:id", |_| Ok("param"));
    router.get("/user/me", |_| Ok("literal"));
    assert_eq!(router.handle(&Request::new("/user/me")).unwrap(), "param");
}

#[test]
fn test_same_pattern_different_methods() {
    let mut router = Router::new();
    router.get("/users/:id", |_| Ok("get"));
    router.put("/users/:id", |_| Ok("put"));
    router.patch("/users/:id", |_| Ok("patch"));
    router.delete("/users/:id", |_| Ok("delete"));

    for (method, expected) in [
        (Method::GET, "get"),
        (Method::PUT, "put"),
        (Method::PATCH, "patch"),
        (Method::DELETE, "delete"),
    ] {
        let req = Request::new("/users/1").with_method(method);
        assert_eq!(router.handle(&req).unwrap(), expected);
    }
}

#[test]
fn test_unknown_method_gets_sentinel() {
    let router = echo_router(Method::GET, "/x");
    let req = Request::new("/x").with_method(Method::OPTIONS);
    assert_eq!(router.handle(&req).unwrap(), "No handler for OPTIONS /x");
}

#[test]
fn test_null_result_is_not_the_sentinel() {
    let mut router = Router::new();
    router.get("/nothing", |_| Ok(()));
    let req = Request::new("/nothing");
    let out = router.handle(&req).unwrap();
    assert_eq!(out, Value::Null);
    assert!(!is_no_handler(&out, &req));
}

#[test]
fn test_sentinel_lookalike_from_handler_is_a_value() {
    let mut router = Router::new();
    router.get("/status", |_| Ok("No handler for GET /elsewhere"));
    let req = Request::new("/status");
    let out = router.handle(&req).unwrap();
    assert_eq!(out, "No handler for GET /elsewhere");
    assert!(!is_no_handler(&out, &req));

    let missing = Request::new("/elsewhere");
    assert!(is_no_handler(&router.handle(&missing).unwrap(), &missing));
}

#[test]
fn test_handler_error_propagates() {
    let mut router = Router::new();
    router.get("/boom", |_| -> anyhow::Result<String> { anyhow::bail!("kaboom") });
    let err = router.handle(&Request::new("/boom")).unwrap_err();
    assert_eq!(err.to_string(), "kaboom");
}

#[test]
fn test_handle_value_loose_input() {
    let router = echo_router(Method::POST, "/users");
    let out = router
        .handle_value(json!({"path": "/users", "method": "post", "body": {"a": 1}}))
        .unwrap();
    assert_eq!(out, json!({"body": {"a": 1}}));

    assert!(router.handle_value(json!({"method": "GET"})).is_err());
}

#[test]
fn test_routes_listing_keeps_order() {
    let mut router = Router::new();
    router.get("/b", |_| Ok(1)).post("/a", |_| Ok(2));
    let listed: Vec<_> = router
        .routes()
        .map(|(m, p)| format!("{m} {p}"))
        .collect();
    assert_eq!(listed, vec!["GET /b", "POST /a"]);
    assert_eq!(router.len(), 2);
}
