//! Demo router wiring every middleware together.
//!
//! # Route Structure
//!
//! - `GET /healthz`     - Liveness check (skipped by the access log by default)
//! - `GET /users?id=N`  - Looks up a user, logging through the request context
//! - `GET /fail`        - Always fails with an error report
//! - `GET /propagate`   - Echoes the headers an outbound call would carry
//!
//! # Middleware
//!
//! Composed with [`ServiceBuilder`], listed outermost first: transport tracing,
//! server span, trace-request binding, user identification, access log.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use crate::config::Config;
use crate::log::{Fields, Logger};
use crate::middleware::{
    AccessLogConfig, ErrorMessages, SpanConfig, TraceRequestConfig, access_log, span,
    trace_request,
};
use crate::trace::{self, Propagation, RequestContext, UserId};

/// Header an upstream gateway sets to the authenticated user id.
pub const X_USER_ID: &str = "x-user-id";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub logger: Arc<Logger>,
    pub propagation: Propagation,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub id: Option<u64>,
}

/// Constructs the demo router.
///
/// Every entry, including the access log, is written through `logger`.
/// Server spans are not exported.
pub fn app_router(config: &Config, logger: Arc<Logger>) -> Router {
    let span_config = SpanConfig::from_environment(logger.environment());
    app_router_with_spans(config, logger, span_config)
}

/// Like [`app_router`], with server spans started from `span_config`.
pub fn app_router_with_spans(
    config: &Config,
    logger: Arc<Logger>,
    span_config: SpanConfig,
) -> Router {
    let state = AppState {
        logger: logger.clone(),
        propagation: span_config.propagation,
    };

    let access_log_config =
        AccessLogConfig::new(logger.clone()).skip_paths(config.access_log_skip.iter().cloned());
    let trace_request_config = TraceRequestConfig::new(logger).dump(config.trace_dump);

    Router::new()
        .route("/healthz", get(health_handler))
        .route("/users", get(user_handler))
        .route("/fail", get(fail_handler))
        .route("/propagate", get(propagate_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG)),
                )
                .layer(middleware::from_fn_with_state(span_config, span::layer))
                .layer(middleware::from_fn_with_state(
                    trace_request_config,
                    trace_request::layer,
                ))
                .layer(middleware::from_fn(identify))
                .layer(middleware::from_fn_with_state(
                    access_log_config,
                    access_log::layer,
                )),
        )
}

/// Binds the gateway-provided user id, if any.
async fn identify(mut req: Request, next: Next) -> Response {
    let uid = req
        .headers()
        .get(X_USER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);
    if let Some(uid) = uid {
        req.extensions_mut().insert(UserId(uid));
    }
    next.run(req).await
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn user_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<UserQuery>,
) -> Response {
    let Some(id) = query.id else {
        state.logger.warn(&ctx).msg("user lookup without id");
        let mut response = (StatusCode::BAD_REQUEST, "missing id").into_response();
        ErrorMessages::record(&mut response, "query parameter `id` is required");
        return response;
    };

    state.logger.info(&ctx).uint("user_id", id).msg("user lookup");
    Json(serde_json::json!({ "id": id, "name": format!("user-{id}") })).into_response()
}

async fn fail_handler(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let err = std::io::Error::other("upstream unavailable");
    state.logger.error(&ctx).err(&err).msg("request failed");

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    ErrorMessages::record(&mut response, err.to_string());
    response
}

async fn propagate_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Json<BTreeMap<String, String>> {
    let mut headers = HeaderMap::new();
    trace::apply_headers(&ctx, &mut headers);
    trace::inject_span(&ctx, state.propagation, &mut headers);

    let echoed = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(echoed)
}
