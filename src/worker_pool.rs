//! # Worker Pool Module
//!
//! A fixed set of isolated [`Worker`] coroutines, each running its own copy of one
//! registered application, with idle/busy bookkeeping and a blocking `dispatch`.
//!
//! ## Behaviour
//!
//! - **Fixed size**: `num_workers` workers are spawned and initialised up front and are
//!   never replaced. A pool of zero workers is legal and rejects every dispatch.
//! - **Stack reuse**: the most recently returned worker is handed out first.
//! - **No wait queue**: when every worker is busy, `dispatch` fails at once with
//!   [`PoolError::Exhausted`]. Retrying is the caller's decision.
//! - **No timeout**: a worker that never replies keeps its caller blocked. A worker whose
//!   coroutine dies surfaces as [`PoolError::WorkerUnresponsive`] and stays busy for good.
//!
//! ## Configuration
//!
//! - `COROUTE_WORKERS`: number of workers (default: 30)
//! - `COROUTE_STACK_SIZE`: worker coroutine stack size, decimal or `0x` hex (default: 64 KB)

use crate::error::PoolError;
use crate::ids::RequestId;
use crate::registry::{AppRef, AppRegistry};
use crate::request::Request;
use crate::worker::{Reply, Worker, WorkerState};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Default number of workers per pool.
pub const DEFAULT_WORKERS: usize = 30;

/// Default worker coroutine stack size (64 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Configuration for a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines
    pub num_workers: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    #[must_use]
    pub fn new(num_workers: usize, stack_size: usize) -> Self {
        Self {
            num_workers,
            stack_size,
        }
    }

    /// Default stack size with the given worker count.
    #[must_use]
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_WORKERS,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Counters for a worker pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    /// Requests handed to a worker
    pub dispatched_count: AtomicU64,
    /// Replies received (including error replies)
    pub completed_count: AtomicU64,
    /// Replies that carried a handler error
    pub error_count: AtomicU64,
    /// Dispatches rejected because no worker was idle
    pub exhausted_count: AtomicU64,
    /// Workers lost because their channel closed
    pub lost_count: AtomicU64,
}

impl WorkerPoolMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self, is_error: bool) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_exhausted(&self) {
        self.exhausted_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lost(&self) {
        self.lost_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_exhausted_count(&self) -> u64 {
        self.exhausted_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_lost_count(&self) -> u64 {
        self.lost_count.load(Ordering::Relaxed)
    }
}

/// Point-in-time occupancy. `idle + busy == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub idle: usize,
    pub busy: usize,
    pub total: usize,
}

/// Idle stack and busy set, guarded together so a worker is always in exactly one.
#[derive(Debug)]
struct Slots {
    idle: Vec<usize>,
    busy: HashSet<usize>,
}

/// A fixed pool of isolated workers running one application.
#[derive(Debug)]
pub struct WorkerPool {
    app: AppRef,
    config: WorkerPoolConfig,
    workers: Vec<Worker>,
    slots: Mutex<Slots>,
    metrics: Arc<WorkerPoolMetrics>,
}

impl WorkerPool {
    /// Spawn `config.num_workers` workers and initialise each with `app`.
    ///
    /// Fails if `app` is not in `registry` or a worker coroutine cannot be spawned.
    pub fn new(
        registry: Arc<AppRegistry>,
        app: impl Into<AppRef>,
        config: WorkerPoolConfig,
    ) -> Result<Self, PoolError> {
        let app = app.into();
        if !registry.contains(&app) {
            error!(app = %app, available = ?registry.names(), "Application not registered");
            return Err(PoolError::UnknownApplication(app.name().to_string()));
        }

        info!(
            app = %app,
            num_workers = config.num_workers,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        let mut workers = Vec::with_capacity(config.num_workers);
        for worker_id in 0..config.num_workers {
            let worker = Worker::spawn(worker_id, Arc::clone(&registry), config.stack_size)?;
            worker.initialize(&app)?;
            workers.push(worker);
        }

        let slots = Slots {
            idle: (0..config.num_workers).collect(),
            busy: HashSet::with_capacity(config.num_workers),
        };

        Ok(Self {
            app,
            config,
            workers,
            slots: Mutex::new(slots),
            metrics: Arc::new(WorkerPoolMetrics::new()),
        })
    }

    /// Hand `request` to an idle worker and block until it replies.
    ///
    /// Inside a `may` coroutine the wait yields to the scheduler; on a plain thread it
    /// parks the thread.
    pub fn dispatch(&self, request: Request) -> Result<Reply, PoolError> {
        let worker_id = self.checkout()?;
        let worker = &self.workers[worker_id];
        let request_id = RequestId::new();

        debug!(
            request_id = %request_id,
            worker_id = worker_id,
            method = %request.method,
            path = %request.path,
            "Request dispatched to worker"
        );
        self.metrics.record_dispatch();
        let start = Instant::now();

        let reply_rx = match worker.submit(request_id, request) {
            Ok(rx) => rx,
            Err(e) => {
                error!(
                    request_id = %request_id,
                    worker_id = worker_id,
                    "Worker inbox closed - worker is lost"
                );
                self.metrics.record_lost();
                return Err(e);
            }
        };

        match reply_rx.recv() {
            Ok(reply) => {
                self.checkin(worker_id);
                self.metrics.record_completion(reply.is_error());
                debug!(
                    request_id = %request_id,
                    worker_id = worker_id,
                    latency_ms = start.elapsed().as_millis() as u64,
                    is_error = reply.is_error(),
                    "Worker reply received"
                );
                Ok(reply)
            }
            Err(_) => {
                // The worker coroutine died with our job; its slot stays busy
                error!(
                    request_id = %request_id,
                    worker_id = worker_id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Worker channel closed before reply - worker is lost"
                );
                self.metrics.record_lost();
                Err(PoolError::WorkerUnresponsive { worker_id })
            }
        }
    }

    /// Pop the most recently returned idle worker and mark it busy, in one step.
    fn checkout(&self) -> Result<usize, PoolError> {
        let mut slots = self.slots.lock();
        let Some(worker_id) = slots.idle.pop() else {
            let busy = slots.busy.len();
            drop(slots);
            self.metrics.record_exhausted();
            warn!(app = %self.app, busy = busy, "No idle workers available");
            return Err(PoolError::Exhausted);
        };
        slots.busy.insert(worker_id);
        Ok(worker_id)
    }

    fn checkin(&self, worker_id: usize) {
        let mut slots = self.slots.lock();
        if slots.busy.remove(&worker_id) {
            slots.idle.push(worker_id);
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock();
        PoolStats {
            idle: slots.idle.len(),
            busy: slots.busy.len(),
            total: self.workers.len(),
        }
    }

    /// Current lifecycle state of every worker, by worker id.
    #[must_use]
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(Worker::state).collect()
    }

    #[must_use]
    pub fn app(&self) -> &AppRef {
        &self.app
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}
