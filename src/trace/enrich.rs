//! Trace enrichment of log events.

use crate::log::{Dict, Fields, LogEvent};

use super::context::RequestContext;

pub const TRACE_KEY: &str = "logging.googleapis.com/trace";
pub const SPAN_ID_KEY: &str = "logging.googleapis.com/spanId";
pub const REQUEST_ID_KEY: &str = "request_id";
pub const UID_KEY: &str = "uid";

/// Adds request-identifying fields to an event.
///
/// The implementation is chosen when the [`crate::log::Logger`] is built.
pub trait Tracing: Send + Sync {
    fn with_trace(&self, ctx: &RequestContext, event: LogEvent) -> LogEvent;
}

/// Cloud Logging enrichment.
///
/// With a [`crate::trace::TracingContext`] bound to `ctx`:
/// - trace reference and span id when a project id is configured and a span is active
/// - `request_id` when non-empty
/// - `uid` when an authenticated user is known
///
/// Without one, the event is returned untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudTrace;

impl Tracing for CloudTrace {
    fn with_trace(&self, ctx: &RequestContext, mut event: LogEvent) -> LogEvent {
        let Some(tracing) = ctx.tracing() else {
            return event;
        };

        let project_id = event.environment().project_id().to_owned();
        if !project_id.is_empty()
            && let Some(span) = ctx.span()
        {
            event = event
                .str(
                    TRACE_KEY,
                    format!("project/{project_id}/traces/{}", span.trace_id()),
                )
                .str(SPAN_ID_KEY, span.span_id().to_string());
        }
        if !tracing.request_id().is_empty() {
            event = event.str(REQUEST_ID_KEY, tracing.request_id());
        }
        if let Some(uid) = ctx.uid() {
            event = event.str(UID_KEY, uid);
        }
        event
    }
}

/// Enriches `event` using the strategy of the logger that created it.
pub fn with_trace(ctx: &RequestContext, event: LogEvent) -> LogEvent {
    let logger = event.logger();
    logger.with_trace(ctx, event)
}

/// Verbose variant used for request diagnostics.
///
/// Adds `trace_id`, `span_id` and `sampled` for the active span regardless of
/// the project id, `serviceContext.service` when a service name is set, and
/// always `client_ip` and `request_id`.
pub fn dump(ctx: &RequestContext, mut event: LogEvent) -> LogEvent {
    let Some(tracing) = ctx.tracing() else {
        return event;
    };

    if let Some(span) = ctx.span() {
        event = event
            .str("trace_id", span.trace_id().to_string())
            .str("span_id", span.span_id().to_string())
            .bool("sampled", span.is_sampled());
    }
    if !tracing.service().is_empty() {
        event = event.dict("serviceContext", Dict::new().str("service", tracing.service()));
    }
    event
        .str("client_ip", tracing.client_ip())
        .str(REQUEST_ID_KEY, tracing.request_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::log::{Logger, MemorySink, Severity};
    use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState, TracingContext};
    use serde_json::json;
    use std::sync::Arc;

    fn logger(project_id: &str) -> Arc<Logger> {
        let sink = Arc::new(MemorySink::new());
        Arc::new(
            Logger::new(sink.clone(), sink).with_environment(Environment::new("api", project_id)),
        )
    }

    fn span() -> SpanContext {
        SpanContext::new(
            TraceId::from_hex("000000000000000000000000000abc12").unwrap(),
            SpanId::from_hex("0000000000000007").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        )
    }

    fn request_ctx(request_id: &str) -> RequestContext {
        RequestContext::background()
            .with_tracing(TracingContext::new("/", "1.2.3.4", request_id, "api"))
            .with_span(span())
    }

    #[test]
    fn test_without_tracing_context_event_is_unchanged() {
        let logger = logger("myproj");
        let ctx = RequestContext::background().with_span(span()).with_user("u-1");

        let event = LogEvent::new(logger, Severity::Info).str("k", "v");
        let before = event.len();
        let event = with_trace(&ctx, event);
        assert_eq!(event.len(), before);

        let event = dump(&ctx, event);
        assert_eq!(event.len(), before);
    }

    #[test]
    fn test_trace_reference_with_project() {
        let event = with_trace(
            &request_ctx("req-1"),
            LogEvent::new(logger("myproj"), Severity::Info),
        );
        assert_eq!(
            event.get(TRACE_KEY),
            Some(&json!("project/myproj/traces/000000000000000000000000000abc12"))
        );
        assert_eq!(event.get(SPAN_ID_KEY), Some(&json!("0000000000000007")));
        assert_eq!(event.get(REQUEST_ID_KEY), Some(&json!("req-1")));
    }

    #[test]
    fn test_no_trace_reference_without_project() {
        let event = with_trace(
            &request_ctx(""),
            LogEvent::new(logger(""), Severity::Info),
        );
        assert!(event.get(TRACE_KEY).is_none());
        assert!(event.get(SPAN_ID_KEY).is_none());
        assert!(event.get(REQUEST_ID_KEY).is_none());
    }

    #[test]
    fn test_uid_added() {
        let ctx = request_ctx("").with_user("user-7");
        let event = with_trace(&ctx, LogEvent::new(logger(""), Severity::Info));
        assert_eq!(event.get(UID_KEY), Some(&json!("user-7")));
    }

    #[test]
    fn test_dump_fields() {
        let ctx = request_ctx("");
        let event = dump(&ctx, LogEvent::new(logger(""), Severity::Debug));

        assert_eq!(
            event.get("trace_id"),
            Some(&json!("000000000000000000000000000abc12"))
        );
        assert_eq!(event.get("span_id"), Some(&json!("0000000000000007")));
        assert_eq!(event.get("sampled"), Some(&json!(true)));
        assert_eq!(
            event.get("serviceContext"),
            Some(&json!({"service": "api"}))
        );
        assert_eq!(event.get("client_ip"), Some(&json!("1.2.3.4")));
        assert_eq!(event.get(REQUEST_ID_KEY), Some(&json!("")));
    }
}
