//! # Runtime Configuration Module
//!
//! Settings that decide how requests are served: which application to load, whether
//! to go through the worker pool, how many workers and how much stack each gets.
//!
//! ## Sources
//!
//! Lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file ([`RuntimeConfig::from_file`])
//! 3. Environment variables ([`RuntimeConfig::apply_env`])
//! 4. Command-line flags (applied by the CLI)
//!
//! ## Environment Variables
//!
//! - `COROUTE_APP`: registered application name (default: `demo`)
//! - `COROUTE_MULTITHREADED`: anything except `false` enables the worker pool (default: on)
//! - `COROUTE_WORKERS`: pool size (default: 30)
//! - `COROUTE_STACK_SIZE`: worker stack size in bytes, decimal or hex (default: `0x10000`)
//!
//! ## Example file
//!
//! ```toml
//! app = "alternate"
//! multithreaded = true
//! workers = 8
//! stack_size = 0x8000
//! ```

use crate::worker_pool::{WorkerPoolConfig, DEFAULT_STACK_SIZE, DEFAULT_WORKERS};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Parse a byte size written either in decimal (`16384`) or hex (`0x4000`).
#[must_use]
pub fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Runtime configuration for the dispatch facade and the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Registered application to serve
    pub app: String,
    /// Serve through the worker pool instead of calling the router directly
    pub multithreaded: bool,
    /// Worker pool size
    pub workers: usize,
    /// Worker coroutine stack size in bytes
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            app: "demo".to_string(),
            multithreaded: true,
            workers: DEFAULT_WORKERS,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Read a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Overlay any `COROUTE_*` environment variables that are set and parse cleanly.
    pub fn apply_env(&mut self) {
        if let Ok(app) = env::var("COROUTE_APP") {
            if !app.trim().is_empty() {
                self.app = app.trim().to_string();
            }
        }
        if let Ok(flag) = env::var("COROUTE_MULTITHREADED") {
            self.multithreaded = flag.trim() != "false";
        }
        if let Some(workers) = env::var("COROUTE_WORKERS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            self.workers = workers;
        }
        if let Some(stack_size) = env::var("COROUTE_STACK_SIZE")
            .ok()
            .and_then(|s| parse_size(&s))
        {
            self.stack_size = stack_size;
        }
    }

    #[must_use]
    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.workers, self.stack_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("16384"), Some(16384));
        assert_eq!(parse_size("0x4000"), Some(0x4000));
        assert_eq!(parse_size(" 0X10 "), Some(16));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.app, "demo");
        assert!(config.multithreaded);
        assert_eq!(config.workers, 30);
        assert_eq!(config.pool_config(), WorkerPoolConfig::default());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "app = \"alternate\"\nworkers = 4").unwrap();

        let config = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.app, "alternate");
        assert_eq!(config.workers, 4);
        assert!(config.multithreaded);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn test_from_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wokers = 4").unwrap();
        assert!(RuntimeConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
