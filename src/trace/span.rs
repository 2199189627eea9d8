//! Span context carried by each request and its HTTP header encodings.
//!
//! Header formats are handled by OpenTelemetry propagators:
//!
//! - Cloud Trace: `X-Cloud-Trace-Context: TRACE_ID/SPAN_ID;o=OPTIONS`, through
//!   [`GoogleTraceContextPropagator`]
//! - W3C Trace Context: `traceparent: 00-TRACE_ID-SPAN_ID-FLAGS`, through
//!   [`TraceContextPropagator`]

use axum::http::HeaderMap;
use opentelemetry::Context;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::TraceContextExt;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_stackdriver::google_trace_context_propagator::GoogleTraceContextPropagator;

use crate::env::Environment;

pub use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

pub const X_CLOUD_TRACE_CONTEXT: &str = "x-cloud-trace-context";
pub const TRACEPARENT: &str = "traceparent";

/// Header format used to carry span context across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    CloudTrace,
    TraceContext,
}

impl Propagation {
    /// Cloud Trace on App Engine / Cloud Run, W3C Trace Context elsewhere.
    pub fn detect(environment: &Environment) -> Self {
        if environment.is_gcp() {
            Self::CloudTrace
        } else {
            Self::TraceContext
        }
    }

    pub fn header_name(self) -> &'static str {
        match self {
            Self::CloudTrace => X_CLOUD_TRACE_CONTEXT,
            Self::TraceContext => TRACEPARENT,
        }
    }

    pub fn propagator(self) -> Box<dyn TextMapPropagator + Send + Sync> {
        match self {
            Self::CloudTrace => Box::new(GoogleTraceContextPropagator::default()),
            Self::TraceContext => Box::new(TraceContextPropagator::new()),
        }
    }

    /// Parent context carried by `headers`. Empty when the header is absent
    /// or malformed.
    pub fn extract(self, headers: &HeaderMap) -> Context {
        self.propagator()
            .extract_with_context(&Context::new(), &HeaderExtractor(headers))
    }

    /// Remote parent span, if present and well-formed.
    pub fn extract_span(self, headers: &HeaderMap) -> Option<SpanContext> {
        let cx = self.extract(headers);
        let span = cx.span().span_context().clone();
        span.is_valid().then_some(span)
    }

    /// Writes `span` into `headers`, replacing any previous value.
    pub fn inject(self, span: &SpanContext, headers: &mut HeaderMap) {
        let cx = Context::new().with_remote_span_context(span.clone());
        self.propagator()
            .inject_context(&cx, &mut HeaderInjector(headers));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const TRACE: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_static(value));
        map
    }

    fn span(span_hex: &str, flags: TraceFlags) -> SpanContext {
        SpanContext::new(
            TraceId::from_hex(TRACE).unwrap(),
            SpanId::from_hex(span_hex).unwrap(),
            flags,
            true,
            TraceState::default(),
        )
    }

    #[test]
    fn test_extract_cloud_trace() {
        let h = headers(X_CLOUD_TRACE_CONTEXT, "4bf92f3577b34da6a3ce929d0e0e4736/12345;o=1");
        let span = Propagation::CloudTrace.extract_span(&h).unwrap();
        assert_eq!(span.trace_id().to_string(), TRACE);
        assert_eq!(span.span_id(), SpanId::from_hex("3039").unwrap());
        assert!(span.is_sampled());
        assert!(span.is_remote());

        let h = headers(X_CLOUD_TRACE_CONTEXT, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert!(Propagation::CloudTrace.extract_span(&h).is_none());

        let h = headers(X_CLOUD_TRACE_CONTEXT, "4bf92f3577b34da6a3ce929d0e0e4736/x;o=1");
        assert!(Propagation::CloudTrace.extract_span(&h).is_none());
    }

    #[test]
    fn test_extract_traceparent() {
        let h = headers(
            TRACEPARENT,
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        );
        let span = Propagation::TraceContext.extract_span(&h).unwrap();
        assert_eq!(span.trace_id().to_string(), TRACE);
        assert_eq!(span.span_id().to_string(), "00f067aa0ba902b7");
        assert!(span.is_sampled());

        let h = headers(
            TRACEPARENT,
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        );
        assert!(Propagation::TraceContext.extract_span(&h).is_none());

        let h = headers(
            TRACEPARENT,
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
        );
        assert!(Propagation::TraceContext.extract_span(&h).is_none());
    }

    #[test]
    fn test_formats_ignore_each_other() {
        let h = headers(
            TRACEPARENT,
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
        );
        assert!(Propagation::CloudTrace.extract_span(&h).is_none());
        assert!(!Propagation::CloudTrace.extract(&h).has_active_span());
    }

    #[test]
    fn test_inject_uses_header_format() {
        let span = span("00000000000000ff", TraceFlags::SAMPLED);
        let mut h = HeaderMap::new();
        Propagation::CloudTrace.inject(&span, &mut h);
        Propagation::TraceContext.inject(&span, &mut h);

        assert_eq!(
            h.get(X_CLOUD_TRACE_CONTEXT).unwrap(),
            "4bf92f3577b34da6a3ce929d0e0e4736/255;o=1"
        );
        assert_eq!(
            h.get(TRACEPARENT).unwrap(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00000000000000ff-01"
        );
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            Propagation::detect(&Environment::new("svc", "")),
            Propagation::CloudTrace
        );
        assert_eq!(
            Propagation::detect(&Environment::default()),
            Propagation::TraceContext
        );
    }
}
