//! Deployment identifiers resolved from the process environment.
//!
//! The service name and GCP project id are looked up once, on first use, and
//! cached for the lifetime of the process. Later changes to the environment are
//! not observed by [`Environment::global`].
//!
//! ## Variables
//!
//! - `GAE_SERVICE`, then `K_SERVICE` - service name (App Engine / Cloud Run)
//! - `GCP_PROJECT`, then `GOOGLE_CLOUD_PROJECT` - project id used in trace references

use std::env;
use std::sync::LazyLock;

/// Candidate variables for the service name, in priority order.
pub const SERVICE_KEYS: [&str; 2] = ["GAE_SERVICE", "K_SERVICE"];

/// Candidate variables for the GCP project id, in priority order.
pub const PROJECT_KEYS: [&str; 2] = ["GCP_PROJECT", "GOOGLE_CLOUD_PROJECT"];

static GLOBAL: LazyLock<Environment> = LazyLock::new(Environment::from_env);

/// Resolved deployment identifiers.
///
/// Empty strings mean "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    service: String,
    project_id: String,
}

impl Environment {
    /// Creates an environment with explicit values.
    pub fn new(service: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            project_id: project_id.into(),
        }
    }

    /// Reads the identifiers from the current process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves the identifiers through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service: first_non_empty(&SERVICE_KEYS, &lookup),
            project_id: first_non_empty(&PROJECT_KEYS, &lookup),
        }
    }

    /// Process-wide environment, resolved on first access.
    pub fn global() -> &'static Environment {
        &GLOBAL
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns `true` when running on App Engine or Cloud Run.
    pub fn is_gcp(&self) -> bool {
        !self.service.is_empty()
    }
}

/// Resolves the service name from the process environment.
pub fn resolve_service() -> String {
    first_non_empty(&SERVICE_KEYS, &|key: &str| env::var(key).ok())
}

/// Resolves the GCP project id from the process environment.
pub fn resolve_project_id() -> String {
    first_non_empty(&PROJECT_KEYS, &|key: &str| env::var(key).ok())
}

fn first_non_empty<F>(keys: &[&str], lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}
