//! Cloud Logging severities and the minimum-level filter.

use serde::Serialize;
use std::fmt;

/// Environment variable holding the minimum level name.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// `@type` marker that routes an entry into Cloud Error Reporting.
pub const ERROR_REPORT_TYPE: &str =
    "type.googleapis.com/google.devtools.clouderrorreporting.v1beta1.ReportedErrorEvent";

/// Log entry severity as understood by Cloud Logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Alert => "ALERT",
            Self::Emergency => "EMERGENCY",
        }
    }

    /// ERROR and above are reported to Error Reporting and written to the error sink.
    pub fn is_error_report(self) -> bool {
        matches!(
            self,
            Self::Error | Self::Critical | Self::Alert | Self::Emergency
        )
    }

    /// Filtering level used against the configured minimum.
    pub fn level(self) -> Level {
        match self {
            Self::Debug => Level::Debug,
            Self::Default | Self::Info | Self::Notice => Level::Info,
            Self::Warning => Level::Warn,
            Self::Error => Level::Error,
            Self::Critical | Self::Alert | Self::Emergency => Level::Fatal,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered filtering levels. `Off` suppresses every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Off,
}

impl Level {
    /// Parses a `LOG_LEVEL` value.
    ///
    /// An unset variable means `Debug`; a set but empty or unknown value
    /// silences logging entirely.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            None => Self::Debug,
            Some("debug") => Self::Debug,
            Some("info") => Self::Info,
            Some("warn") => Self::Warn,
            Some("error") => Self::Error,
            Some("fatal") => Self::Fatal,
            Some(_) => Self::Off,
        }
    }

    /// Reads [`LOG_LEVEL_ENV`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(LOG_LEVEL_ENV).ok().as_deref())
    }

    /// Returns `true` if an entry at `level` passes this minimum.
    pub fn allows(self, level: Level) -> bool {
        self != Self::Off && level >= self
    }
}
