//! Span export over OTLP/HTTP.
//!
//! On Cloud Run the usual target is an OpenTelemetry Collector sidecar that
//! forwards to Cloud Trace. The endpoint is taken from
//! `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT` when set.

use std::collections::HashMap;
use std::env;

use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::env::Environment;
use crate::error::{Error, Result};

pub const ENDPOINT_KEY: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4318/v1/traces";

/// Header naming the project spans are billed to and stored in.
pub const X_GOOG_USER_PROJECT: &str = "x-goog-user-project";

/// Exporter options.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Overrides the project id resolved from the environment.
    pub project_id: Option<String>,
    pub endpoint: String,
    pub service: String,
}

impl ExporterConfig {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            project_id: None,
            endpoint: env::var(ENDPOINT_KEY)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            service: service.into(),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Builds a tracer provider that batches spans to `config.endpoint` and
/// installs it as the global provider.
///
/// Pass the result to [`crate::middleware::SpanConfig::with_provider`] so
/// server spans are exported. Call `shutdown` on it before exit to flush.
///
/// # Errors
///
/// Returns [`Error::TraceExporter`] when no project id is configured or the
/// exporter cannot be built.
pub fn new_exporter(
    config: &ExporterConfig,
    environment: &Environment,
) -> Result<SdkTracerProvider> {
    let project_id = config
        .project_id
        .clone()
        .unwrap_or_else(|| environment.project_id().to_string());
    if project_id.is_empty() {
        return Err(Error::TraceExporter {
            source: "project id is not set".into(),
        });
    }

    let headers = HashMap::from([(X_GOOG_USER_PROJECT.to_string(), project_id.clone())]);
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.clone())
        .with_headers(headers)
        .build()
        .map_err(|e| Error::TraceExporter {
            source: Box::new(e),
        })?;

    let mut resource =
        Resource::builder().with_attribute(KeyValue::new("gcp.project_id", project_id.clone()));
    if !config.service.is_empty() {
        resource = resource.with_service_name(config.service.clone());
    }

    let provider = SdkTracerProvider::builder()
        .with_resource(resource.build())
        .with_batch_exporter(exporter)
        .build();
    global::set_tracer_provider(provider.clone());

    tracing::info!(
        endpoint = %config.endpoint,
        project_id = %project_id,
        service = %config.service,
        "Trace exporter installed"
    );
    Ok(provider)
}
