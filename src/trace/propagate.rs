//! Copies request identifiers onto outbound calls.

use axum::http::{HeaderMap, HeaderValue};

use super::client_ip::X_REAL_IP;
use super::context::{RequestContext, X_REQUEST_ID};
use super::span::Propagation;

/// Writes the bound client address and request id onto outbound headers.
///
/// Empty values are not written. Does nothing outside of a request.
pub fn apply_headers(ctx: &RequestContext, headers: &mut HeaderMap) {
    let Some(tracing) = ctx.tracing() else {
        return;
    };
    set_non_empty(headers, X_REAL_IP, tracing.client_ip());
    set_non_empty(headers, X_REQUEST_ID, tracing.request_id());
}

/// Writes the active span so the callee joins the same trace.
pub fn inject_span(ctx: &RequestContext, propagation: Propagation, headers: &mut HeaderMap) {
    if let Some(span) = ctx.span() {
        propagation.inject(span, headers);
    }
}

fn set_non_empty(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
