//! # CLI Module
//!
//! Command-line front end for the bundled applications.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print the route table of one application, or of all of them:
//!
//! ```bash
//! coroute routes --app alternate
//! ```
//!
//! ### `run`
//!
//! Read one JSON request per line from stdin, dispatch each on its own coroutine and
//! write one JSON result per line to stdout, in input order:
//!
//! ```bash
//! echo '{"path": "/hello/World"}' | coroute run --app demo --workers 4
//! # {"line":1,"response":"Hello, World!"}
//! ```
//!
//! Options:
//! - `--app <NAME>` - Application to route to (default: `demo`)
//! - `--workers <N>` - Pool size (default: 30)
//! - `--single-threaded` - Skip the pool and route on the calling context
//! - `--config <FILE>` - TOML config, applied before `COROUTE_*` variables and flags

mod commands;


pub use commands::{dispatch_lines, list_routes, resolve_config, run_cli, Cli, Commands};
