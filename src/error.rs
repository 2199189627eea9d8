use thiserror::Error;

/// Boxed error returned by pluggable collaborators such as [`crate::profile::Profiler`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The profiler agent could not be started after all retries.
    #[error("profiler failed to start after {attempts} attempt(s): {source}")]
    ProfilerStart {
        attempts: usize,
        #[source]
        source: BoxError,
    },

    /// The span exporter or its tracer provider could not be built.
    #[error("trace exporter could not be created: {source}")]
    TraceExporter {
        #[source]
        source: BoxError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
