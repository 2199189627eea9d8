//! Server span for each inbound request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use opentelemetry::KeyValue;
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer, TracerProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::env::Environment;
use crate::trace::{Propagation, SpanContext};

/// Instrumentation scope of server spans.
pub const TRACER_NAME: &str = env!("CARGO_PKG_NAME");

/// Span middleware options.
#[derive(Clone)]
pub struct SpanConfig {
    /// Header format the remote parent span is read from.
    pub propagation: Propagation,
    /// Source of span ids and sampling decisions, and where ended spans go.
    pub provider: SdkTracerProvider,
}

impl SpanConfig {
    /// Spans get real ids and sampling but are not exported anywhere.
    pub fn new(propagation: Propagation) -> Self {
        Self::with_provider(propagation, SdkTracerProvider::builder().build())
    }

    /// Uses `provider`, typically one from [`crate::trace::new_exporter`].
    pub fn with_provider(propagation: Propagation, provider: SdkTracerProvider) -> Self {
        Self {
            propagation,
            provider,
        }
    }

    pub fn from_environment(environment: &Environment) -> Self {
        Self::new(Propagation::detect(environment))
    }
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self::from_environment(Environment::global())
    }
}

/// Starts a server span and binds its [`SpanContext`] to the request.
///
/// A well-formed inbound trace header makes the span a child of the caller's
/// span and inherits its sampling decision; otherwise a new root is started.
/// The span ends once the inner service has produced a response. Must wrap
/// the layers whose logs should carry trace references.
pub async fn layer(State(config): State<SpanConfig>, mut req: Request, next: Next) -> Response {
    if req.extensions().get::<SpanContext>().is_some() {
        return next.run(req).await;
    }

    let parent = config.propagation.extract(req.headers());
    let tracer = config.provider.tracer(TRACER_NAME);
    let mut span = tracer
        .span_builder(format!("{} {}", req.method(), req.uri().path()))
        .with_kind(SpanKind::Server)
        .start_with_context(&tracer, &parent);

    let span_context = span.span_context().clone();
    tracing::debug!(
        trace_id = %span_context.trace_id(),
        span_id = %span_context.span_id(),
        sampled = span_context.is_sampled(),
        remote_parent = parent.has_active_span(),
        "Server span started"
    );
    req.extensions_mut().insert(span_context);

    let response = next.run(req).await;

    let status = response.status();
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status.as_u16()),
    ));
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    }
    span.end();
    response
}
