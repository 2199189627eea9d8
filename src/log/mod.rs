//! Cloud Logging structured entries.
//!
//! Every entry is a JSON object carrying a `severity`, a `timestamp`, the
//! caller's fields and, when emitted inside a request, the trace and request
//! identifiers bound to that request:
//!
//! ```json
//! {
//!   "severity": "ERROR",
//!   "@type": "type.googleapis.com/google.devtools.clouderrorreporting.v1beta1.ReportedErrorEvent",
//!   "message": "payment failed",
//!   "logging.googleapis.com/trace": "project/my-project/traces/4bf92f3577b34da6a3ce929d0e0e4736",
//!   "logging.googleapis.com/spanId": "00f067aa0ba902b7",
//!   "request_id": "b7ad6b71",
//!   "caller": "src/billing.rs:42",
//!   "timestamp": "2024-05-01T10:00:00.123456789Z"
//! }
//! ```
//!
//! The free functions below use the process-wide [`Logger`]; components that
//! take a logger at construction should prefer an injected `Arc<Logger>`.

mod event;
mod logger;
mod severity;
mod sink;

use crate::trace::RequestContext;

pub use event::{
    CALLER_KEY, Dict, ERROR_KEY, Fields, LogEvent, MESSAGE_KEY, SEVERITY_KEY, TIMESTAMP_KEY,
    TYPE_KEY,
};
pub use logger::{Logger, global, set_global, set_global_err, set_global_out};
pub use severity::{ERROR_REPORT_TYPE, LOG_LEVEL_ENV, Level, Severity};
pub use sink::{MemorySink, Sink, WriterSink};

pub fn default() -> LogEvent {
    global().default()
}

pub fn debug(ctx: &RequestContext) -> LogEvent {
    global().debug(ctx)
}

pub fn info(ctx: &RequestContext) -> LogEvent {
    global().info(ctx)
}

pub fn notice(ctx: &RequestContext) -> LogEvent {
    global().notice(ctx)
}

pub fn warn(ctx: &RequestContext) -> LogEvent {
    global().warn(ctx)
}

#[track_caller]
pub fn error(ctx: &RequestContext) -> LogEvent {
    global().error(ctx)
}

#[track_caller]
pub fn critical(ctx: &RequestContext) -> LogEvent {
    global().critical(ctx)
}

#[track_caller]
pub fn fatal(ctx: &RequestContext) -> LogEvent {
    global().fatal(ctx)
}

#[track_caller]
pub fn alert(ctx: &RequestContext) -> LogEvent {
    global().alert(ctx)
}

#[track_caller]
pub fn emergency(ctx: &RequestContext) -> LogEvent {
    global().emergency(ctx)
}
