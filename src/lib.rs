//! # Stackdriver
//!
//! Cloud Logging structured logs and request-trace correlation for Axum services.
//!
//! ## Overview
//!
//! - **Logging** ([`log`]) - JSON entries in the Cloud Logging format, severity
//!   filtering via `LOG_LEVEL`, error-report routing to stderr
//! - **Trace correlation** ([`trace`]) - per-request identifiers (client IP,
//!   request id, span) attached to every entry written while serving a request,
//!   header propagation on outbound calls and optional OTLP span export
//! - **Middleware** ([`middleware`]) - server spans, context binding, access log
//! - **Profiler** ([`profile`]) - continuous-profiler activation with retries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use stackdriver::middleware::{AccessLogConfig, SpanConfig, access_log, span};
//! use stackdriver::prelude::*;
//!
//! async fn handler(ctx: RequestContext) -> &'static str {
//!     log::info(&ctx).str("user", "alice").msg("hello");
//!     "ok"
//! }
//!
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(from_fn_with_state(AccessLogConfig::default(), access_log::layer))
//!     .layer(from_fn_with_state(SpanConfig::default(), span::layer));
//! ```
//!
//! ## Configuration
//!
//! The library reads `GAE_SERVICE` / `K_SERVICE`, `GCP_PROJECT` /
//! `GOOGLE_CLOUD_PROJECT` and `LOG_LEVEL` (see [`env`] and [`log::Level`]).
//! The demo binary's own options live in [`config::Config`].

pub mod env;
pub mod error;
pub mod log;
pub mod middleware;
pub mod profile;
pub mod trace;

pub mod config;
pub mod server;

pub mod routes;

pub use error::Error;
pub use log::Logger;
pub use trace::{RequestContext, TracingContext};

/// Commonly used types for external consumers.
///
/// Re-exports the logging entry points and the request context extractor.
pub mod prelude {
    pub use crate::log::{self, Dict, Fields, LogEvent, Logger, Severity};
    pub use crate::trace::{RequestContext, TracingContext, UserId};
}
