//! Log entry builders.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::logger::Logger;
use super::severity::{ERROR_REPORT_TYPE, Severity};
use crate::env::Environment;

pub const SEVERITY_KEY: &str = "severity";
pub const TYPE_KEY: &str = "@type";
pub const MESSAGE_KEY: &str = "message";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const CALLER_KEY: &str = "caller";
pub const ERROR_KEY: &str = "error";

/// Typed field setters shared by [`LogEvent`] and [`Dict`].
///
/// Setting a key twice keeps the last value.
pub trait Fields: Sized {
    fn fields_mut(&mut self) -> &mut Map<String, Value>;

    fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields_mut().insert(key.to_owned(), value.into());
        self
    }

    fn str(self, key: &str, value: impl Into<String>) -> Self {
        self.field(key, Value::String(value.into()))
    }

    fn int(self, key: &str, value: i64) -> Self {
        self.field(key, value)
    }

    fn uint(self, key: &str, value: u64) -> Self {
        self.field(key, value)
    }

    /// Non-finite values are written as `null`.
    fn float(self, key: &str, value: f64) -> Self {
        self.field(key, value)
    }

    fn bool(self, key: &str, value: bool) -> Self {
        self.field(key, value)
    }

    fn dict(self, key: &str, dict: Dict) -> Self {
        self.field(key, Value::Object(dict.into_map()))
    }

    /// Serializes any value; values that fail to serialize are written as `null`.
    fn any<T: Serialize>(self, key: &str, value: &T) -> Self {
        self.field(key, serde_json::to_value(value).unwrap_or(Value::Null))
    }

    fn err(self, err: &dyn std::error::Error) -> Self {
        self.str(ERROR_KEY, err.to_string())
    }
}

/// Nested dictionary value such as `httpRequest` or `serviceContext`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    fields: Map<String, Value>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

impl Fields for Dict {
    fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }
}

/// A log entry under construction.
///
/// Created by the severity constructors on [`Logger`], filled with fields,
/// then written exactly once by [`LogEvent::msg`] or [`LogEvent::send`], both of
/// which consume the builder.
#[must_use = "a log event is only written by `msg` or `send`"]
pub struct LogEvent {
    logger: Arc<Logger>,
    severity: Severity,
    fields: Map<String, Value>,
    caller: Option<&'static Location<'static>>,
}

impl LogEvent {
    pub(crate) fn new(logger: Arc<Logger>, severity: Severity) -> Self {
        let mut fields = Map::new();
        fields.insert(SEVERITY_KEY.to_owned(), Value::from(severity.as_str()));
        if severity.is_error_report() {
            fields.insert(TYPE_KEY.to_owned(), Value::from(ERROR_REPORT_TYPE));
        }
        Self {
            logger,
            severity,
            fields,
            caller: None,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Number of fields set so far, `severity` included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Deployment identifiers of the logger this event belongs to.
    pub fn environment(&self) -> &Environment {
        self.logger.environment()
    }

    pub(crate) fn logger(&self) -> Arc<Logger> {
        self.logger.clone()
    }

    /// Overrides the reported call site.
    ///
    /// Only entries written to the error sink carry a caller.
    pub fn caller(mut self, location: &'static Location<'static>) -> Self {
        self.caller = Some(location);
        self
    }

    /// Writes the entry with `message` and consumes the builder.
    pub fn msg(self, message: impl AsRef<str>) {
        let Self {
            logger,
            severity,
            mut fields,
            caller,
        } = self;

        if !logger.enabled(severity) {
            return;
        }

        let message = message.as_ref();
        if !message.is_empty() {
            fields.insert(MESSAGE_KEY.to_owned(), Value::from(message));
        }
        if severity.is_error_report()
            && let Some(location) = caller
        {
            fields.insert(
                CALLER_KEY.to_owned(),
                Value::from(format!("{}:{}", location.file(), location.line())),
            );
        }
        fields.insert(
            TIMESTAMP_KEY.to_owned(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );

        logger.write(severity, &fields);
    }

    /// Writes the entry without a message.
    pub fn send(self) {
        self.msg("")
    }
}

impl Fields for LogEvent {
    fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }
}

impl fmt::Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("severity", &self.severity)
            .field("fields", &self.fields)
            .field("caller", &self.caller)
            .finish()
    }
}
