//! One Cloud Logging `httpRequest` entry per completed request.

use std::collections::HashSet;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::log::{self, Dict, Fields, LogEvent, Logger};
use crate::trace::{self, RequestContext, UserId};

pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Post-processes the access-log event before it is written.
pub type Decorator = Arc<dyn Fn(LogEvent) -> LogEvent + Send + Sync>;

/// Access-log options.
#[derive(Clone)]
pub struct AccessLogConfig {
    /// Logger receiving the `INFO` entries.
    pub logger: Arc<Logger>,
    /// Exact paths that are never logged, e.g. health checks.
    pub skip_paths: Arc<HashSet<String>>,
    /// Optional hook run on every event before emission.
    pub decorator: Option<Decorator>,
}

impl AccessLogConfig {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            skip_paths: Arc::default(),
            decorator: None,
        }
    }

    pub fn skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_paths = Arc::new(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn decorate<F>(mut self, decorator: F) -> Self
    where
        F: Fn(LogEvent) -> LogEvent + Send + Sync + 'static,
    {
        self.decorator = Some(Arc::new(decorator));
        self
    }
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self::new(log::global())
    }
}

/// Private error messages recorded by handlers.
///
/// Stored in the response extensions; the access log uses them as the entry's
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMessages(Vec<String>);

impl ErrorMessages {
    /// Appends `message` to the messages recorded on `response`.
    pub fn record(response: &mut Response, message: impl Into<String>) {
        let message = message.into();
        match response.extensions_mut().get_mut::<ErrorMessages>() {
            Some(messages) => messages.0.push(message),
            None => {
                response.extensions_mut().insert(ErrorMessages(vec![message]));
            }
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ErrorMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.0.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, message)?;
        }
        Ok(())
    }
}

/// Request attributes captured before the handler consumes the request.
struct RequestSummary {
    method: String,
    url: String,
    protocol: String,
    user_agent: String,
    remote_ip: String,
    request_size: i64,
}

impl RequestSummary {
    fn capture(req: &Request, remote_ip: &str) -> Self {
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let request_size = content_length(req.headers())
            .or_else(|| req.body().size_hint().exact())
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1);

        Self {
            method: req.method().to_string(),
            url: request_url(req),
            protocol: format!("{:?}", req.version()),
            user_agent,
            remote_ip: remote_ip.to_string(),
            request_size,
        }
    }

    fn into_dict(self, status: StatusCode, response_size: u64, latency: Duration) -> Dict {
        Dict::new()
            .int("status", i64::from(status.as_u16()))
            .str("remoteIp", self.remote_ip)
            .str("userAgent", self.user_agent)
            .str("latency", format_latency(latency))
            .str("requestMethod", self.method)
            .str("requestUrl", self.url)
            .str("protocol", self.protocol)
            .int("requestSize", self.request_size)
            .int("responseSize", i64::try_from(response_size).unwrap_or(-1))
    }
}

/// Everything the entry needs except the number of bytes sent.
struct PendingEntry {
    config: AccessLogConfig,
    ctx: RequestContext,
    summary: RequestSummary,
    status: StatusCode,
    message: String,
    start: Instant,
}

impl PendingEntry {
    fn emit(self, response_size: u64) {
        let latency = self.start.elapsed();
        let event = self.config.logger.info(&self.ctx).dict(
            "httpRequest",
            self.summary.into_dict(self.status, response_size, latency),
        );
        let event = match &self.config.decorator {
            Some(decorate) => decorate(event),
            None => event,
        };
        event.msg(self.message);
    }
}

/// Response body that counts the bytes it yields and writes the access-log
/// entry when it ends, fails or is dropped.
struct CountingBody {
    inner: Body,
    sent: u64,
    entry: Option<PendingEntry>,
}

impl CountingBody {
    fn finish(&mut self) {
        if let Some(entry) = self.entry.take() {
            entry.emit(self.sent);
        }
    }
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.sent += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_)) | None) => this.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Logs every request not listed in [`AccessLogConfig::skip_paths`].
///
/// Binds the request's [`trace::TracingContext`] if no earlier layer did, so
/// the entry carries the same identifiers as the handler's own logs.
///
/// `responseSize` is the body's exact length when known up front. Streamed
/// bodies are counted as they are sent and the entry is written once the body
/// ends, so `latency` then covers the whole transfer.
///
/// The request context is captured when the request enters this layer. A
/// [`UserId`] must therefore be bound by a layer outside this one, or inserted
/// into the response extensions by whatever identifies the user further in.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/users", get(list_users))
///     .layer(middleware::from_fn_with_state(
///         AccessLogConfig::new(logger).skip_paths(["/healthz"]),
///         access_log::layer,
///     ));
/// ```
pub async fn layer(State(config): State<AccessLogConfig>, mut req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();

    let bound = trace::bind(&mut req, config.logger.environment().service());
    let mut ctx = RequestContext::from_extensions(req.extensions());
    let summary = RequestSummary::capture(&req, bound.client_ip());

    let response = next.run(req).await;

    if config.skip_paths.contains(&path) {
        return response;
    }

    if ctx.uid().is_none()
        && let Some(UserId(uid)) = response.extensions().get::<UserId>()
    {
        ctx = ctx.with_user(uid.clone());
    }
    let message = response
        .extensions()
        .get::<ErrorMessages>()
        .map(ToString::to_string)
        .unwrap_or_default();

    let entry = PendingEntry {
        config,
        ctx,
        summary,
        status: response.status(),
        message,
        start,
    };

    if let Some(size) = response.body().size_hint().exact() {
        entry.emit(size);
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = CountingBody {
        inner: body,
        sent: 0,
        entry: Some(entry),
    };
    Response::from_parts(parts, Body::new(body))
}

/// Absolute URL of the request.
///
/// Absolute request targets are passed through unchanged. Otherwise the URL is
/// rebuilt from the `Host` header, using `https` when the request arrived
/// through a TLS-terminating proxy (`X-Forwarded-Proto: https`).
pub fn request_url<B>(req: &Request<B>) -> String {
    let uri = req.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let secure = req
        .headers()
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
    let scheme = if secure { "https" } else { "http" };

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or_default();
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    format!("{scheme}://{host}{path_and_query}")
}

/// Cloud Logging duration: seconds as a decimal followed by `s`.
pub fn format_latency(latency: Duration) -> String {
    format!("{}s", latency.as_secs_f64())
}

fn content_length(headers: &axum::http::HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
