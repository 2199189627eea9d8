//! Request-scoped tracing data.
//!
//! A [`TracingContext`] is built once per inbound request and stored in the
//! request extensions as an `Arc<TracingContext>`, the single typed key for it.
//! Handlers read it back, together with the active [`SpanContext`] and the
//! authenticated [`UserId`], through the [`RequestContext`] extractor.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, Request};
use axum::http::{Extensions, request::Parts};

use super::client_ip::resolve_client_ip;
use super::span::SpanContext;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Immutable per-request identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingContext {
    path: String,
    client_ip: String,
    request_id: String,
    service: String,
}

impl TracingContext {
    pub fn new(
        path: impl Into<String>,
        client_ip: impl Into<String>,
        request_id: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            client_ip: client_ip.into(),
            request_id: request_id.into(),
            service: service.into(),
        }
    }

    /// Captures path, client address and `X-Request-Id` from `req`.
    ///
    /// The peer address comes from [`ConnectInfo`] when the server was started
    /// with `into_make_service_with_connect_info`.
    pub fn from_request<B>(req: &Request<B>, service: &str) -> Self {
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());
        let request_id = req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        Self::new(
            req.uri().path(),
            resolve_client_ip(req.headers(), remote_addr.as_deref()),
            request_id,
            service,
        )
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

/// Binds a [`TracingContext`] to `req` unless one is already bound.
///
/// Returns the context now bound to the request.
pub fn bind<B>(req: &mut Request<B>, service: &str) -> Arc<TracingContext> {
    if let Some(existing) = req.extensions().get::<Arc<TracingContext>>() {
        return existing.clone();
    }
    let tracing = Arc::new(TracingContext::from_request(req, service));
    req.extensions_mut().insert(tracing.clone());
    tracing
}

/// Authenticated user id, inserted into the request extensions by an
/// authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Everything log enrichment may read for the current unit of work.
///
/// Outside of a request (background jobs, startup) use
/// [`RequestContext::background`]; enrichment then adds nothing.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    tracing: Option<Arc<TracingContext>>,
    span: Option<SpanContext>,
    user: Option<UserId>,
}

impl RequestContext {
    pub fn background() -> Self {
        Self::default()
    }

    /// Collects the typed values bound to a request.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        Self {
            tracing: extensions.get::<Arc<TracingContext>>().cloned(),
            span: extensions.get::<SpanContext>().cloned(),
            user: extensions.get::<UserId>().cloned(),
        }
    }

    pub fn with_tracing(mut self, tracing: impl Into<Arc<TracingContext>>) -> Self {
        self.tracing = Some(tracing.into());
        self
    }

    pub fn with_span(mut self, span: SpanContext) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_user(mut self, uid: impl Into<String>) -> Self {
        self.user = Some(UserId(uid.into()));
        self
    }

    pub fn tracing(&self) -> Option<&TracingContext> {
        self.tracing.as_deref()
    }

    /// Active span, if a valid one is bound.
    pub fn span(&self) -> Option<&SpanContext> {
        self.span.as_ref().filter(|span| span.is_valid())
    }

    pub fn uid(&self) -> Option<&str> {
        self.user.as_ref().map(|UserId(uid)| uid.as_str())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_extensions(&parts.extensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanId, TraceFlags, TraceId, TraceState};
    use axum::body::Body;

    #[test]
    fn test_from_request() {
        let mut req = Request::builder()
            .uri("/users?id=5")
            .header("x-forwarded-for", "1.2.3.4, 5.6.7.8")
            .header(X_REQUEST_ID, "req-42")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.0.0.9:4000".parse::<SocketAddr>().unwrap()));

        let tc = TracingContext::from_request(&req, "api");
        assert_eq!(tc.path(), "/users");
        assert_eq!(tc.client_ip(), "1.2.3.4");
        assert_eq!(tc.request_id(), "req-42");
        assert_eq!(tc.service(), "api");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.0.0.9:4000".parse::<SocketAddr>().unwrap()));

        let tc = TracingContext::from_request(&req, "");
        assert_eq!(tc.client_ip(), "10.0.0.9");
        assert_eq!(tc.request_id(), "");
    }

    #[test]
    fn test_bind_keeps_first_context() {
        let mut req = Request::builder()
            .uri("/first")
            .body(Body::empty())
            .unwrap();
        let first = bind(&mut req, "api");
        *req.uri_mut() = "/second".parse().unwrap();
        let second = bind(&mut req, "api");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.path(), "/first");
    }

    #[test]
    fn test_from_extensions() {
        let span = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        let mut extensions = Extensions::new();
        extensions.insert(Arc::new(TracingContext::new("/", "1.1.1.1", "", "")));
        extensions.insert(span.clone());
        extensions.insert(UserId("u-1".to_string()));

        let ctx = RequestContext::from_extensions(&extensions);
        assert_eq!(ctx.tracing().unwrap().client_ip(), "1.1.1.1");
        assert_eq!(ctx.span(), Some(&span));
        assert_eq!(ctx.uid(), Some("u-1"));

        let empty = RequestContext::from_extensions(&Extensions::new());
        assert!(empty.tracing().is_none());
        assert!(empty.span().is_none());
        assert!(empty.uid().is_none());
    }

    #[test]
    fn test_invalid_span_is_ignored() {
        let ctx = RequestContext::background().with_span(SpanContext::empty_context());
        assert!(ctx.span().is_none());
    }
}
