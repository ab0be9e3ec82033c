//! # Router Module
//!
//! Matches an abstract [`Request`](crate::request::Request) to a registered handler by
//! method and path pattern, then calls the handler with an assembled argument.
//!
//! ## Overview
//!
//! - Patterns are `/`-separated; a segment starting with `:` binds a parameter.
//! - Routes are scanned in registration order and the first full match wins.
//! - Unmatched requests return the sentinel string `"No handler for <METHOD> <path>"`.
//!
//! ## Argument assembly
//!
//! The handler receives a [`HandlerArg`]:
//!
//! 1. If the match bound no parameters and the request has no query, no headers and no
//!    body, the handler gets the request's `arg` verbatim (possibly absent).
//! 2. Otherwise it gets the parameters plus `query`, `headers` and `body` for each of
//!    those that is present. `arg` is dropped in this case.
//!
//! ## Example
//!
//! ```rust
//! use coroute::request::Request;
//! use coroute::router::Router;
//!
//! let mut router = Router::new();
//! router.get("/hello/:name", |arg| {
//!     Ok(format!("Hello, {}!", arg.param("name").unwrap_or_default()))
//! });
//!
//! let out = router.handle(&Request::new("/hello/World")).unwrap();
//! assert_eq!(out, "Hello, World!");
//! ```

mod core;
mod matcher;
#[cfg(test)]
mod tests;

pub use core::{
    is_no_handler, no_handler_message, Handler, HandlerArg, HandlerResult, ParamArg,
    RouteEntry, Router,
};
pub use matcher::{
    match_pattern, MatchResult, ParamVec, RoutePattern, MAX_INLINE_PARAMS, PARAM_SIGIL,
};
