//! # coroute
//!
//! **coroute** routes JSON-shaped requests to handler functions by path pattern and
//! HTTP method, and optionally runs each application inside a fixed pool of `may`
//! coroutine workers so CPU-bound handlers do not block the caller.
//!
//! ## Architecture
//!
//! - **[`router`]** - `:param` path patterns, first-match route tables, handler arguments
//! - **[`request`]** - The normalised request record and its JSON intake
//! - **[`registry`]** - Named application factories; each worker builds its own instance
//! - **[`worker`]** - One coroutine holding one isolated router, serving one request at a time
//! - **[`worker_pool`]** - Fixed-size pool with idle/busy bookkeeping and immediate exhaustion
//! - **[`dispatcher`]** - Single-threaded or pooled facade for front ends
//! - **[`runtime_config`]** / **[`logging`]** - Environment and file configuration, tracing setup
//! - **[`apps`]** - The bundled `demo` and `alternate` applications
//! - **[`cli`]** - The `coroute` binary's commands
//!
//! ### Request Flow (multi-threaded)
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Pool as WorkerPool
//!     participant Worker
//!     participant Router
//!
//!     Caller->>Pool: dispatch(request)
//!     Pool->>Pool: pop idle id, mark busy
//!     Pool->>Worker: Request(job)
//!     Worker->>Router: handle(request)
//!     Router-->>Worker: value / error
//!     Worker-->>Pool: Reply
//!     Pool->>Pool: mark idle
//!     Pool-->>Caller: Reply
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use coroute::request::Request;
//! use coroute::router::{HandlerArg, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router
//!     .get("/hello/:name", |arg: HandlerArg| {
//!         Ok(format!("Hello, {}!", arg.param("name").unwrap_or_default()))
//!     })
//!     .post("/echo", |arg: HandlerArg| Ok(arg.to_value()));
//!
//! let out = router.handle(&Request::new("/hello/World")).unwrap();
//! assert_eq!(out, "Hello, World!");
//!
//! let out = router
//!     .handle(&Request::new("/missing").with_method(Method::PUT))
//!     .unwrap();
//! assert_eq!(out, "No handler for PUT /missing");
//! ```

pub mod apps;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod request;
pub mod router;
pub mod runtime_config;
pub mod worker;
pub mod worker_pool;

pub use dispatcher::{DispatchMode, Dispatcher};
pub use error::{DispatchError, PoolError, RequestError};
pub use registry::{AppRef, AppRegistry};
pub use request::Request;
pub use router::{HandlerArg, Router};
pub use worker::Reply;
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
