//! # Worker Module
//!
//! A worker is one `may` coroutine that owns one instance of a routed application and
//! serves requests from its private inbox, one at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! uninitialized --Init--> ready --Request--> busy --reply--> ready --> ...
//! ```
//!
//! A request that reaches the inbox before the `Init` message is held in the worker and
//! served as soon as the application has loaded. Nothing polls: the worker simply does
//! not answer queued requests until its router exists.
//!
//! ## Faults
//!
//! Handler errors and handler panics are converted to [`Reply::Error`] by [`process`].
//! The worker keeps running and serves the next request normally.

use crate::error::PoolError;
use crate::ids::RequestId;
use crate::registry::{AppRef, AppRegistry};
use crate::request::Request;
use crate::router::Router;
use may::coroutine;
use may::sync::mpsc;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a worker sends back for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The handler's result, or the "no handler" sentinel.
    Value(Value),
    /// Text of a handler error or panic.
    Error(String),
}

impl Reply {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Reply::Value(v) => Some(v),
            Reply::Error(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Reply::Error(e) => Some(e),
            Reply::Value(_) => None,
        }
    }

    /// Wire form: the raw value, or `{"error": "<text>"}`.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Reply::Value(v) => v,
            Reply::Error(e) => json!({ "error": e }),
        }
    }
}

/// One request travelling to a worker, with the channel its reply goes back on.
pub struct Job {
    pub request_id: RequestId,
    pub request: Request,
    pub reply_tx: mpsc::Sender<Reply>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("request_id", &self.request_id)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Messages a worker understands.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Load the named application. Sent once, before any request.
    Init { app: AppRef },
    Request(Job),
}

/// Observable lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Uninitialized = 0,
    Ready = 1,
    Busy = 2,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Ready,
            2 => WorkerState::Busy,
            _ => WorkerState::Uninitialized,
        }
    }
}

/// Handle to a spawned worker coroutine.
///
/// Dropping the handle closes the inbox; the coroutine exits once it has drained it.
pub struct Worker {
    id: usize,
    inbox: mpsc::Sender<WorkerMessage>,
    state: Arc<AtomicU8>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Spawn the worker coroutine. It stays uninitialized until [`Worker::initialize`].
    pub fn spawn(
        id: usize,
        registry: Arc<AppRegistry>,
        stack_size: usize,
    ) -> Result<Self, PoolError> {
        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let state = Arc::new(AtomicU8::new(WorkerState::Uninitialized as u8));
        let worker_state = Arc::clone(&state);

        // SAFETY: may marks coroutine spawning unsafe because the closure must not hold
        // thread-local references across yields. The closure owns everything it uses
        // (receiver, registry, state) and touches no thread-locals.
        let spawned = unsafe {
            coroutine::Builder::new()
                .name(format!("worker-{id}"))
                .stack_size(stack_size)
                .spawn(move || run(id, &rx, &registry, &worker_state))
        };

        match spawned {
            Ok(_) => {
                debug!(worker_id = id, stack_size = stack_size, "Worker coroutine spawned");
                Ok(Self {
                    id,
                    inbox: tx,
                    state,
                })
            }
            Err(source) => {
                error!(worker_id = id, error = %source, "Failed to spawn worker coroutine");
                Err(PoolError::Spawn {
                    worker_id: id,
                    source,
                })
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Tell the worker which application to load.
    pub fn initialize(&self, app: &AppRef) -> Result<(), PoolError> {
        self.inbox
            .send(WorkerMessage::Init { app: app.clone() })
            .map_err(|_| PoolError::WorkerUnresponsive { worker_id: self.id })
    }

    /// Queue a request; the returned receiver yields exactly one reply.
    pub fn submit(
        &self,
        request_id: RequestId,
        request: Request,
    ) -> Result<mpsc::Receiver<Reply>, PoolError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let job = Job {
            request_id,
            request,
            reply_tx,
        };
        self.inbox
            .send(WorkerMessage::Request(job))
            .map_err(|_| PoolError::WorkerUnresponsive { worker_id: self.id })?;
        Ok(reply_rx)
    }
}

/// Application slot inside a running worker.
enum Loaded {
    /// Not initialized yet; requests wait here in arrival order.
    Pending(VecDeque<Job>),
    Ready(Router),
    /// The application could not be built; every request gets this error.
    Failed(String),
}

fn run(id: usize, inbox: &mpsc::Receiver<WorkerMessage>, registry: &AppRegistry, state: &AtomicU8) {
    let mut app = Loaded::Pending(VecDeque::new());

    for message in inbox.iter() {
        match message {
            WorkerMessage::Init { app: app_ref } => {
                let next = match registry.build(&app_ref) {
                    Some(router) => {
                        info!(worker_id = id, app = %app_ref, routes = router.len(), "Worker initialized");
                        Loaded::Ready(router)
                    }
                    None => {
                        error!(worker_id = id, app = %app_ref, "Worker could not load application");
                        Loaded::Failed(format!("application '{app_ref}' is not registered"))
                    }
                };
                let queued = match std::mem::replace(&mut app, next) {
                    Loaded::Pending(queued) => queued,
                    Loaded::Ready(_) | Loaded::Failed(_) => {
                        warn!(worker_id = id, app = %app_ref, "Worker re-initialized");
                        VecDeque::new()
                    }
                };
                state.store(WorkerState::Ready as u8, Ordering::Release);
                for job in queued {
                    serve(id, &app, job, state);
                }
            }
            WorkerMessage::Request(job) => {
                if let Loaded::Pending(queue) = &mut app {
                    debug!(
                        worker_id = id,
                        request_id = %job.request_id,
                        "Request arrived before init - holding"
                    );
                    queue.push_back(job);
                } else {
                    serve(id, &app, job, state);
                }
            }
        }
    }

    debug!(worker_id = id, "Worker inbox closed - exiting");
}

fn serve(id: usize, app: &Loaded, job: Job, state: &AtomicU8) {
    let Job {
        request_id,
        request,
        reply_tx,
    } = job;

    state.store(WorkerState::Busy as u8, Ordering::Release);
    let start = Instant::now();

    let reply = match app {
        Loaded::Ready(router) => process(router, &request),
        Loaded::Failed(reason) => Reply::Error(reason.clone()),
        Loaded::Pending(_) => Reply::Error("worker is not initialized".to_string()),
    };

    if let Reply::Error(reason) = &reply {
        warn!(
            worker_id = id,
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            error = %reason,
            "Request failed inside worker"
        );
    } else {
        debug!(
            worker_id = id,
            request_id = %request_id,
            method = %request.method,
            path = %request.path,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Worker request complete"
        );
    }

    // Ready before replying so the pool never sees a returned worker still marked busy
    state.store(WorkerState::Ready as u8, Ordering::Release);
    if reply_tx.send(reply).is_err() {
        warn!(worker_id = id, request_id = %request_id, "Reply dropped - caller went away");
    }
}

/// Run a request through `router`, converting handler errors and panics to
/// [`Reply::Error`].
#[must_use]
pub fn process(router: &Router, request: &Request) -> Reply {
    match panic::catch_unwind(AssertUnwindSafe(|| router.handle(request))) {
        Ok(Ok(value)) => Reply::Value(value),
        Ok(Err(err)) => Reply::Error(format!("{err:#}")),
        Err(payload) => Reply::Error(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::HandlerArg;

    fn faulty_router() -> Router {
        let mut router = Router::new();
        router.get("/ok/:v", |arg: HandlerArg| {
            Ok(arg.param("v").unwrap_or_default().to_string())
        });
        router.get("/err", |_| -> anyhow::Result<()> { anyhow::bail!("bad input") });
        router.get("/panic", |_| -> anyhow::Result<()> { panic!("exploded") });
        router
    }

    #[test]
    fn test_process_value() {
        let reply = process(&faulty_router(), &Request::new("/ok/7"));
        assert_eq!(reply, Reply::Value(Value::String("7".into())));
        assert!(!reply.is_error());
    }

    #[test]
    fn test_process_converts_error() {
        let reply = process(&faulty_router(), &Request::new("/err"));
        assert_eq!(reply.error(), Some("bad input"));
        assert_eq!(reply.into_value(), json!({"error": "bad input"}));
    }

    #[test]
    fn test_process_converts_panic() {
        let router = faulty_router();
        let reply = process(&router, &Request::new("/panic"));
        assert_eq!(reply.error(), Some("handler panicked: exploded"));

        // The same router keeps serving afterwards
        let reply = process(&router, &Request::new("/ok/again"));
        assert_eq!(reply.value(), Some(&json!("again")));
    }

    #[test]
    fn test_process_sentinel_is_a_value() {
        let reply = process(&faulty_router(), &Request::new("/missing"));
        assert_eq!(reply, Reply::Value(json!("No handler for GET /missing")));
    }

    fn registry() -> Arc<AppRegistry> {
        let mut registry = AppRegistry::new();
        registry.register("faulty", faulty_router);
        Arc::new(registry)
    }

    #[test]
    fn test_request_before_init_is_held_then_served() {
        let worker = Worker::spawn(0, registry(), 0x10000).unwrap();
        let reply_rx = worker.submit(RequestId::new(), Request::new("/ok/early")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(worker.state(), WorkerState::Uninitialized);
        assert!(reply_rx.try_recv().is_err());

        worker.initialize(&AppRef::new("faulty")).unwrap();
        assert_eq!(reply_rx.recv().unwrap(), Reply::Value(json!("early")));

        let reply_rx = worker.submit(RequestId::new(), Request::new("/ok/late")).unwrap();
        assert_eq!(reply_rx.recv().unwrap(), Reply::Value(json!("late")));
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn test_unknown_app_fails_queued_and_later_requests() {
        let worker = Worker::spawn(1, registry(), 0x10000).unwrap();
        let queued_rx = worker.submit(RequestId::new(), Request::new("/ok/1")).unwrap();
        worker.initialize(&AppRef::new("nope")).unwrap();

        let expected = Reply::Error("application 'nope' is not registered".to_string());
        assert_eq!(queued_rx.recv().unwrap(), expected);

        let later_rx = worker.submit(RequestId::new(), Request::new("/ok/2")).unwrap();
        assert_eq!(later_rx.recv().unwrap(), expected);
    }

    #[test]
    fn test_state_round_trip() {
        for s in [WorkerState::Uninitialized, WorkerState::Ready, WorkerState::Busy] {
            assert_eq!(WorkerState::from_u8(s as u8), s);
        }
    }
}
