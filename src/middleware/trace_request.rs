//! Binds the tracing context and optionally dumps request diagnostics.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::log::{
    self, CALLER_KEY, Fields, Logger, MESSAGE_KEY, SEVERITY_KEY, TIMESTAMP_KEY, TYPE_KEY,
};
use crate::trace::{self, RequestContext};

/// Trace-request options.
#[derive(Clone)]
pub struct TraceRequestConfig {
    /// Logger receiving the diagnostic `DEBUG` entries.
    pub logger: Arc<Logger>,
    /// When `true`, every request produces a header dump and a trace dump.
    pub dump: bool,
}

impl TraceRequestConfig {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            dump: false,
        }
    }

    pub fn dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }
}

impl Default for TraceRequestConfig {
    fn default() -> Self {
        Self::new(log::global())
    }
}

/// Entry keys a request header must not overwrite.
const RESERVED_KEYS: [&str; 5] = [SEVERITY_KEY, TYPE_KEY, MESSAGE_KEY, TIMESTAMP_KEY, CALLER_KEY];

/// Binds the request's [`trace::TracingContext`].
///
/// With dumping enabled, first writes one `DEBUG` entry mapping every header
/// name to its first value, then one `DEBUG` entry with the dumped trace
/// identifiers. Headers named like a reserved entry key (`severity`,
/// `message`, ...) are left out of the dump.
pub async fn layer(
    State(config): State<TraceRequestConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    if config.dump {
        dump_headers(&config.logger, &req);
    }

    trace::bind(&mut req, config.logger.environment().service());

    if config.dump {
        let ctx = RequestContext::from_extensions(req.extensions());
        trace::dump(&ctx, config.logger.debug(&ctx)).send();
    }

    next.run(req).await
}

fn dump_headers(logger: &Arc<Logger>, req: &Request) {
    let ctx = RequestContext::from_extensions(req.extensions());
    let headers = req.headers();
    let event = headers
        .keys()
        .filter(|name| !RESERVED_KEYS.contains(&name.as_str()))
        .fold(logger.debug(&ctx), |event, name| match headers.get(name) {
            Some(value) => event.str(name.as_str(), String::from_utf8_lossy(value.as_bytes())),
            None => event,
        });
    event.send();
}
