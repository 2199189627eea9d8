//! Request-scoped trace context, enrichment and propagation.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → span.rs (remote parent from X-Cloud-Trace-Context / traceparent)
//!     → context.rs (TracingContext bound to request extensions)
//!     → handler logs through RequestContext
//!         → enrich.rs (trace reference, request_id, uid)
//!     → propagate.rs / client.rs (identifiers copied onto outbound calls)
//! ended server spans
//!     → exporter.rs (OTLP/HTTP, when installed)
//! ```

pub mod client;
pub mod client_ip;
pub mod context;
pub mod enrich;
pub mod exporter;
pub mod propagate;
pub mod span;

pub use client::{Propagate, PropagateLayer};
pub use client_ip::resolve_client_ip;
pub use context::{RequestContext, TracingContext, UserId, X_REQUEST_ID, bind};
pub use enrich::{CloudTrace, Tracing, dump, with_trace};
pub use exporter::{ExporterConfig, new_exporter};
pub use propagate::{apply_headers, inject_span};
pub use span::{Propagation, SpanContext, SpanId, TraceFlags, TraceId, TraceState};
