//! Tower layer that propagates request identifiers on outbound HTTP calls.
//!
//! Wrap an HTTP client service and attach the caller's [`RequestContext`] to
//! each outgoing request's extensions:
//!
//! ```rust,ignore
//! let client = ServiceBuilder::new()
//!     .layer(PropagateLayer::new(Propagation::detect(Environment::global())))
//!     .service(http_client);
//!
//! let mut req = Request::get(url).body(body)?;
//! req.extensions_mut().insert(ctx.clone());
//! client.oneshot(req).await?;
//! ```

use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use super::context::RequestContext;
use super::propagate::{apply_headers, inject_span};
use super::span::Propagation;

/// Applies [`apply_headers`] and [`inject_span`] to every request.
#[derive(Debug, Clone, Copy)]
pub struct PropagateLayer {
    propagation: Propagation,
}

impl PropagateLayer {
    pub fn new(propagation: Propagation) -> Self {
        Self { propagation }
    }
}

impl<S> Layer<S> for PropagateLayer {
    type Service = Propagate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Propagate {
            inner,
            propagation: self.propagation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Propagate<S> {
    inner: S,
    propagation: Propagation,
}

impl<S, B> Service<Request<B>> for Propagate<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if let Some(ctx) = req.extensions().get::<RequestContext>().cloned() {
            let headers = req.headers_mut();
            apply_headers(&ctx, headers);
            inject_span(&ctx, self.propagation, headers);
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState, TracingContext};
    use axum::http::HeaderMap;
    use std::convert::Infallible;
    use tower::{ServiceBuilder, ServiceExt, service_fn};

    async fn echo(req: Request<()>) -> Result<HeaderMap, Infallible> {
        Ok(req.headers().clone())
    }

    #[tokio::test]
    async fn test_outbound_request_carries_identifiers() {
        let ctx = RequestContext::background()
            .with_tracing(TracingContext::new("/", "1.2.3.4", "req-4", "api"))
            .with_span(SpanContext::new(
                TraceId::from_hex("105445aa7843bc8bf206b12000100000").unwrap(),
                SpanId::from_hex("0000000000000010").unwrap(),
                TraceFlags::SAMPLED,
                false,
                TraceState::default(),
            ));
        let client = ServiceBuilder::new()
            .layer(PropagateLayer::new(Propagation::CloudTrace))
            .service(service_fn(echo));

        let mut req = Request::get("http://backend/items").body(()).unwrap();
        req.extensions_mut().insert(ctx);
        let headers = client.oneshot(req).await.unwrap();

        assert_eq!(headers.get("x-real-ip").unwrap(), "1.2.3.4");
        assert_eq!(headers.get("x-request-id").unwrap(), "req-4");
        assert_eq!(
            headers.get("x-cloud-trace-context").unwrap(),
            "105445aa7843bc8bf206b12000100000/16;o=1"
        );
    }

    #[tokio::test]
    async fn test_request_without_context_is_untouched() {
        let client = PropagateLayer::new(Propagation::TraceContext).layer(service_fn(echo));
        let req = Request::get("http://backend/items").body(()).unwrap();
        let headers = client.oneshot(req).await.unwrap();
        assert!(headers.is_empty());
    }
}
