use crate::error::{DispatchError, PoolError};
use crate::registry::{AppRef, AppRegistry};
use crate::request::Request;
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::worker_pool::{PoolStats, WorkerPool, WorkerPoolConfig};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// How requests reach the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// The caller runs the router itself.
    SingleThreaded,
    /// Each request goes to an idle worker in the pool.
    MultiThreaded,
}

/// Entry point for a front end: routes directly or through the worker pool.
#[derive(Debug)]
pub enum Dispatcher {
    Direct(Arc<Router>),
    Pooled(WorkerPool),
}

impl Dispatcher {
    /// Build the application named by `app` once and call it on the caller's context.
    pub fn direct(registry: &AppRegistry, app: impl Into<AppRef>) -> Result<Self, DispatchError> {
        let app = app.into();
        let router = registry
            .build(&app)
            .ok_or_else(|| PoolError::UnknownApplication(app.name().to_string()))?;
        info!(app = %app, routes = router.len(), "Dispatching single-threaded");
        Ok(Dispatcher::Direct(Arc::new(router)))
    }

    /// Start a worker pool running `app`.
    pub fn pooled(
        registry: Arc<AppRegistry>,
        app: impl Into<AppRef>,
        config: WorkerPoolConfig,
    ) -> Result<Self, DispatchError> {
        Ok(Dispatcher::Pooled(WorkerPool::new(registry, app, config)?))
    }

    /// Pick the mode from `config.multithreaded`.
    pub fn from_config(
        registry: Arc<AppRegistry>,
        config: &RuntimeConfig,
    ) -> Result<Self, DispatchError> {
        if config.multithreaded {
            Self::pooled(registry, config.app.as_str(), config.pool_config())
        } else {
            Self::direct(&registry, config.app.as_str())
        }
    }

    #[must_use]
    pub fn mode(&self) -> DispatchMode {
        match self {
            Dispatcher::Direct(_) => DispatchMode::SingleThreaded,
            Dispatcher::Pooled(_) => DispatchMode::MultiThreaded,
        }
    }

    /// Serve one request.
    ///
    /// In direct mode a handler error comes back as [`DispatchError::Handler`]. In
    /// pooled mode the worker has already turned it into `{"error": "..."}`, which is
    /// returned as an ordinary value.
    pub fn dispatch(&self, request: Request) -> Result<Value, DispatchError> {
        let start = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();

        let out = match self {
            Dispatcher::Direct(router) => router.handle(&request).map_err(DispatchError::Handler),
            Dispatcher::Pooled(pool) => Ok(pool.dispatch(request)?.into_value()),
        };

        debug!(
            method = %method,
            path = %path,
            mode = ?self.mode(),
            ok = out.is_ok(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        out
    }

    /// Normalise a loosely shaped request, then [`Dispatcher::dispatch`] it.
    pub fn dispatch_value(&self, raw: Value) -> Result<Value, DispatchError> {
        self.dispatch(Request::from_value(raw)?)
    }

    /// Pool occupancy; `None` in single-threaded mode.
    #[must_use]
    pub fn stats(&self) -> Option<PoolStats> {
        match self {
            Dispatcher::Direct(_) => None,
            Dispatcher::Pooled(pool) => Some(pool.stats()),
        }
    }
}
