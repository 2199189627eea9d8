//! HTTP server initialization and runtime setup.
//!
//! Handles logger construction, optional span export and profiler activation,
//! and the Axum server lifecycle.

use crate::config::Config;
use crate::env::Environment;
use crate::log::{self, Logger};
use crate::middleware::SpanConfig;
use crate::profile::{self, Profiler, ProfilerConfig};
use crate::routes::app_router_with_spans;
use crate::trace::{ExporterConfig, Propagation, new_exporter};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Cloud Logging logger (also installed as the process-wide default)
/// - Span exporter, when `TRACE_EXPORT` is enabled
/// - Profiler, when both `PROFILER_RETRY` and an agent are provided
/// - Axum HTTP server with graceful shutdown on Ctrl+C
///
/// # Errors
///
/// Returns an error if:
/// - The span exporter cannot be created
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config, profiler: Option<Arc<dyn Profiler>>) -> Result<()> {
    let logger = Logger::from_env();
    log::set_global(logger.clone());
    let logger = Arc::new(logger);

    match (profiler, config.profiler_retry) {
        (Some(profiler), Some(retries)) => {
            let service = Environment::global().service().to_string();
            let profiler_config = ProfilerConfig::new(service, config.service_version.clone());
            tokio::spawn(async move {
                if let Err(e) = profile::activate(profiler.as_ref(), &profiler_config, retries).await
                {
                    tracing::error!("Profiler disabled: {e}");
                }
            });
        }
        (None, Some(_)) => tracing::warn!("PROFILER_RETRY is set but no profiler agent is linked"),
        _ => tracing::debug!("Profiler disabled"),
    }

    let environment = logger.environment().clone();
    let provider = if config.trace_export {
        let exporter_config = ExporterConfig::new(environment.service());
        Some(new_exporter(&exporter_config, &environment)?)
    } else {
        None
    };
    let span_config = match &provider {
        Some(provider) => {
            SpanConfig::with_provider(Propagation::detect(&environment), provider.clone())
        }
        None => SpanConfig::from_environment(&environment),
    };

    let app = app_router_with_spans(&config, logger, span_config);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(provider) = provider
        && let Err(e) = provider.shutdown()
    {
        tracing::warn!("Failed to flush spans: {e}");
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
