//! Continuous-profiler activation with fixed-delay retries.

use std::time::Duration;

use async_trait::async_trait;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;

use crate::env::Environment;
use crate::error::{BoxError, Error, Result};

/// Delay between profiler start attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Settings handed to the profiler agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    pub service: String,
    pub service_version: String,
    /// Required when not running on GCP.
    pub project_id: String,
    pub retry_delay: Duration,
}

impl ProfilerConfig {
    /// Uses the project id resolved from the environment.
    pub fn new(service: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            service_version: service_version.into(),
            project_id: Environment::global().project_id().to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// A profiler agent client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Profiler: Send + Sync {
    /// Starts the agent. May be called again after a failure.
    async fn start(&self, config: &ProfilerConfig) -> Result<(), BoxError>;
}

/// Starts `profiler`, retrying up to `retries` more times on failure.
///
/// Each failure is logged at WARN. Attempts are separated by
/// [`ProfilerConfig::retry_delay`].
///
/// # Errors
///
/// Returns [`Error::ProfilerStart`] carrying the last failure when every
/// attempt failed.
pub async fn activate<P>(profiler: &P, config: &ProfilerConfig, retries: usize) -> Result<()>
where
    P: Profiler + ?Sized,
{
    let strategy = FixedInterval::new(config.retry_delay).take(retries);
    let mut attempts = 0usize;

    let result = Retry::start(strategy, || {
        attempts += 1;
        let attempt = attempts;
        async move {
            profiler.start(config).await.inspect_err(|e| {
                tracing::warn!(
                    attempt,
                    service = %config.service,
                    error = %e,
                    "Profiler failed to start"
                );
            })
        }
    })
    .await;

    match result {
        Ok(()) => {
            tracing::info!(service = %config.service, attempts, "Profiler started");
            Ok(())
        }
        Err(source) => Err(Error::ProfilerStart { attempts, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProfilerConfig {
        ProfilerConfig::new("api", "1.0.0")
            .with_project_id("myproj")
            .with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_activate_first_try() {
        let mut profiler = MockProfiler::new();
        profiler
            .expect_start()
            .withf(|c| c.service == "api" && c.project_id == "myproj")
            .times(1)
            .returning(|_| Ok(()));

        assert!(activate(&profiler, &config(), 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_activate_succeeds_after_retries() {
        let mut profiler = MockProfiler::new();
        let mut calls = 0;
        profiler.expect_start().times(3).returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err("agent not ready".into())
            } else {
                Ok(())
            }
        });

        assert!(activate(&profiler, &config(), 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_activate_returns_last_error() {
        let mut profiler = MockProfiler::new();
        profiler
            .expect_start()
            .times(3)
            .returning(|_| Err("permission denied".into()));

        let err = activate(&profiler, &config(), 2).await.unwrap_err();
        let Error::ProfilerStart { attempts, source } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(attempts, 3);
        assert_eq!(source.to_string(), "permission denied");
    }

    #[tokio::test]
    async fn test_activate_without_retries() {
        let mut profiler = MockProfiler::new();
        profiler
            .expect_start()
            .times(1)
            .returning(|_| Err("unavailable".into()));

        assert!(activate(&profiler, &config(), 0).await.is_err());
    }
}
