//! Error types for request normalisation, the worker pool and the dispatch facade.
//!
//! A route that does not match is not an error: the router returns the
//! `"No handler for <METHOD> <path>"` sentinel as an ordinary value.

use thiserror::Error;

/// A loosely shaped request could not be normalised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request must be a JSON object")]
    NotAnObject,
    #[error("request is missing the required 'path' field")]
    MissingPath,
    #[error("request field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
}

/// Failures raised synchronously by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every worker is busy. There is no wait queue; the caller decides whether to retry.
    #[error("No idle workers available")]
    Exhausted,
    /// The worker's channel closed before it replied. Its slot stays busy for good.
    #[error("worker {worker_id} stopped responding")]
    WorkerUnresponsive { worker_id: usize },
    #[error("application '{0}' is not registered")]
    UnknownApplication(String),
    #[error("failed to spawn worker {worker_id}")]
    Spawn {
        worker_id: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Failures surfaced by [`crate::dispatcher::Dispatcher`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Request(#[from] RequestError),
    /// A handler failed while running directly on the caller (single-threaded mode).
    #[error("handler fault: {0:#}")]
    Handler(anyhow::Error),
}
