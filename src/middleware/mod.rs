//! Axum middleware for request tracing and access logging.
//!
//! All three are plain `async fn`s meant for
//! [`axum::middleware::from_fn_with_state`], each taking its config struct as
//! state. Recommended order, outermost first:
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/", get(handler))
//!     .layer(from_fn_with_state(access_log_config, access_log::layer))
//!     .layer(from_fn_with_state(trace_request_config, trace_request::layer))
//!     .layer(from_fn_with_state(span_config, span::layer))
//! ```
//!
//! `.layer` wraps what came before, so the span layer above runs first and
//! its span is visible to both inner layers.

pub mod access_log;
pub mod span;
pub mod trace_request;

pub use access_log::{AccessLogConfig, Decorator, ErrorMessages};
pub use span::SpanConfig;
pub use trace_request::TraceRequestConfig;
