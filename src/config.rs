//! Demo service configuration loaded from environment variables.
//!
//! Configuration is loaded once at startup and validated before the server starts.
//! Deployment identifiers (`GAE_SERVICE` / `K_SERVICE`, `GCP_PROJECT` /
//! `GOOGLE_CLOUD_PROJECT`) and `LOG_LEVEL` are resolved by the library itself,
//! see [`crate::env`] and [`crate::log::Level`].
//!
//! ## Optional Variables
//!
//! - `LISTEN` - Bind address (default: `0.0.0.0:8080`)
//! - `RUST_LOG` - Filter for the service's own diagnostics (default: `info`)
//! - `LOG_FORMAT` - Diagnostics format: `text` or `json` (default: `text`)
//! - `TRACE_DUMP` - Dump headers and trace ids of every request (default: `false`)
//! - `TRACE_EXPORT` - Export server spans over OTLP/HTTP (default: `false`)
//! - `ACCESS_LOG_SKIP` - Comma-separated paths without access log (default: `/healthz`)
//! - `SERVICE_VERSION` - Reported to the profiler (default: crate version)
//! - `PROFILER_RETRY` - Profiler start retries; unset disables the profiler

use anyhow::{Context, Result};
use std::env;

use crate::env::Environment;
use crate::log::Level;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub log_level: String,
    pub log_format: String,
    /// Enables per-request header and trace dumps at DEBUG.
    pub trace_dump: bool,
    /// Exports server spans through [`crate::trace::new_exporter`].
    pub trace_export: bool,
    /// Exact request paths excluded from the access log.
    pub access_log_skip: Vec<String>,
    pub service_version: String,
    /// Number of profiler start retries. `None` leaves the profiler off.
    pub profiler_retry: Option<usize>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PROFILER_RETRY` is set but not a number.
    pub fn from_env() -> Result<Self> {
        let listen_addr = env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let trace_dump = env_flag("TRACE_DUMP");
        let trace_export = env_flag("TRACE_EXPORT");

        let access_log_skip = env::var("ACCESS_LOG_SKIP")
            .map(|v| parse_path_list(&v))
            .unwrap_or_else(|_| vec!["/healthz".to_string()]);

        let service_version = env::var("SERVICE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let profiler_retry = env::var("PROFILER_RETRY")
            .ok()
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("PROFILER_RETRY must be a non-negative integer")?;

        Ok(Self {
            listen_addr,
            log_level,
            log_format,
            trace_dump,
            trace_export,
            access_log_skip,
            service_version,
            profiler_retry,
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_format` is not `text` or `json`
    /// - `listen_addr` is invalid
    /// - a skipped path does not start with `/`
    pub fn validate(&self) -> Result<()> {
        if self.log_format != "text" && self.log_format != "json" {
            anyhow::bail!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            );
        }

        if !self.listen_addr.contains(':') {
            anyhow::bail!(
                "LISTEN must be in format 'host:port', got '{}'",
                self.listen_addr
            );
        }

        if let Some(path) = self.access_log_skip.iter().find(|p| !p.starts_with('/')) {
            anyhow::bail!("ACCESS_LOG_SKIP entries must start with '/', got '{}'", path);
        }

        Ok(())
    }

    /// Prints configuration summary.
    pub fn print_summary(&self) {
        let environment = Environment::global();
        tracing::info!("Configuration loaded:");
        tracing::info!("  Listen address: {}", self.listen_addr);
        tracing::info!("  Service: {}", display_or_unset(environment.service()));
        tracing::info!("  Project: {}", display_or_unset(environment.project_id()));
        tracing::info!("  Entry level: {:?}", Level::from_env());
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Log format: {}", self.log_format);
        tracing::info!("  Trace dump: {}", self.trace_dump);
        tracing::info!("  Trace export: {}", self.trace_export);
        tracing::info!("  Access log skip: {:?}", self.access_log_skip);
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn parse_path_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() { "(unset)" } else { value }
}

/// Loads and validates configuration from environment variables.
///
/// # Errors
///
/// Returns an error if a variable is malformed or validation fails.
///
/// # Note
///
/// This function expects environment variables to be already loaded
/// (e.g., via `dotenvy::dotenv()` in `main.rs`).
pub fn load_from_env() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}
