use crate::apps;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::registry::{AppRef, AppRegistry};
use crate::runtime_config::RuntimeConfig;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use may::coroutine::{self, JoinHandle};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Command-line interface for coroute
#[derive(Parser)]
#[command(name = "coroute")]
#[command(about = "Route JSON requests through a pool of coroutine workers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the routes of a bundled application
    Routes {
        /// Application name (defaults to every bundled application)
        #[arg(short, long)]
        app: Option<String>,
    },
    /// Read one JSON request per stdin line and write one JSON result per line
    Run {
        /// Application name (overrides COROUTE_APP and the config file)
        #[arg(short, long)]
        app: Option<String>,

        /// Number of pool workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Route on the calling context instead of the worker pool
        #[arg(long, default_value_t = false)]
        single_threaded: bool,

        /// TOML file with `app`, `multithreaded`, `workers` and `stack_size` keys
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Routes { app } => {
            let registry = apps::registry();
            let listing = list_routes(&registry, app.as_deref())?;
            let mut out = io::stdout().lock();
            for line in listing {
                writeln!(out, "{line}")?;
            }
        }
        Commands::Run {
            app,
            workers,
            single_threaded,
            config,
        } => {
            let config = resolve_config(config.as_deref(), app, workers, single_threaded)?;
            let dispatcher = Arc::new(Dispatcher::from_config(
                Arc::new(apps::registry()),
                &config,
            )?);
            let results = dispatch_lines(
                &dispatcher,
                io::stdin().lock(),
                config.stack_size,
                config.workers,
            )?;
            let mut out = io::stdout().lock();
            for result in &results {
                writeln!(out, "{result}")?;
            }
            info!(
                lines = results.len(),
                stats = ?dispatcher.stats(),
                "Finished processing input"
            );
        }
    }
    Ok(())
}

/// Layer configuration: defaults, then the file, then `COROUTE_*`, then flags.
pub fn resolve_config(
    file: Option<&std::path::Path>,
    app: Option<String>,
    workers: Option<usize>,
    single_threaded: bool,
) -> Result<RuntimeConfig> {
    let mut config = match file {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    config.apply_env();
    if let Some(app) = app {
        config.app = app;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }
    if single_threaded {
        config.multithreaded = false;
    }
    Ok(config)
}

/// One `METHOD pattern` line per route, prefixed with the application name.
pub fn list_routes(registry: &AppRegistry, app: Option<&str>) -> Result<Vec<String>> {
    let names: Vec<String> = match app {
        Some(name) => vec![name.to_string()],
        None => registry.names().into_iter().map(str::to_string).collect(),
    };

    let mut lines = Vec::new();
    for name in names {
        let app = AppRef::new(&name);
        let router = registry
            .build(&app)
            .ok_or_else(|| anyhow!("Unknown application '{name}'"))?;
        for (method, pattern) in router.routes() {
            lines.push(format!("{name}\t{method}\t{pattern}"));
        }
    }
    Ok(lines)
}

/// Dispatch every non-blank line on its own coroutine and return one result object
/// per line, in input order.
///
/// At most `max_in_flight` lines run at once; the oldest is joined before another is
/// spawned. Capping at the pool size keeps the CLI from exhausting its own pool.
///
/// Successes are `{"line": n, "response": v}`; malformed input, pool exhaustion and
/// direct-mode handler faults are `{"line": n, "error": "..."}`.
pub fn dispatch_lines(
    dispatcher: &Arc<Dispatcher>,
    input: impl BufRead,
    stack_size: usize,
    max_in_flight: usize,
) -> Result<Vec<Value>> {
    let max_in_flight = max_in_flight.max(1);
    let mut in_flight = VecDeque::with_capacity(max_in_flight);
    let mut results = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.context("Failed to read input line")?;
        if line.trim().is_empty() {
            continue;
        }
        if in_flight.len() >= max_in_flight {
            if let Some((done_no, handle)) = in_flight.pop_front() {
                results.push(collect_line(done_no, handle));
            }
        }
        let dispatcher = Arc::clone(dispatcher);

        // SAFETY: may marks coroutine spawning unsafe because the closure must not hold
        // thread-local references across yields. The closure owns its line and a
        // dispatcher handle and touches no thread-locals.
        let handle = unsafe {
            coroutine::Builder::new()
                .name(format!("line-{line_no}"))
                .stack_size(stack_size)
                .spawn(move || dispatch_line(&dispatcher, &line))
        }
        .with_context(|| format!("Failed to spawn coroutine for line {line_no}"))?;
        in_flight.push_back((line_no, handle));
    }

    results.extend(
        in_flight
            .into_iter()
            .map(|(line_no, handle)| collect_line(line_no, handle)),
    );
    Ok(results)
}

fn collect_line(line_no: usize, handle: JoinHandle<Result<Value, String>>) -> Value {
    let outcome = handle
        .join()
        .unwrap_or_else(|_| Err("request coroutine panicked".to_string()));
    match outcome {
        Ok(response) => json!({ "line": line_no, "response": response }),
        Err(error) => json!({ "line": line_no, "error": error }),
    }
}

fn dispatch_line(dispatcher: &Dispatcher, line: &str) -> Result<Value, String> {
    let raw: Value = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {e}"))?;
    dispatcher.dispatch_value(raw).map_err(|e| {
        if !matches!(e, DispatchError::Handler(_)) {
            warn!(error = %e, "Request not dispatched");
        }
        e.to_string()
    })
}
