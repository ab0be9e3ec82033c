//! # Dispatcher Module
//!
//! The facade a front end calls for every request. It hides whether the routed
//! application runs on the caller's own context or inside the worker pool.
//!
//! ## Modes
//!
//! - **Single-threaded** ([`Dispatcher::Direct`]): one shared [`Router`](crate::router::Router)
//!   handles each request on the calling coroutine. Handler errors propagate to the caller.
//! - **Multi-threaded** ([`Dispatcher::Pooled`]): each request is handed to an idle worker
//!   and the caller waits for its reply. Handler errors come back as `{"error": "..."}`
//!   values; pool exhaustion is returned as an error straight away.
//!
//! ```rust,no_run
//! use coroute::apps;
//! use coroute::dispatcher::Dispatcher;
//! use coroute::request::Request;
//! use coroute::runtime_config::RuntimeConfig;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(apps::registry());
//! let dispatcher = Dispatcher::from_config(registry, &RuntimeConfig::from_env())?;
//! let response = dispatcher.dispatch(Request::new("/hello/World"))?;
//! println!("{response}");
//! # Ok(())
//! # }
//! ```

mod core;

pub use core::{DispatchMode, Dispatcher};
