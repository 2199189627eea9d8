//! Severity-stamping logger and the process-wide default instance.

use std::panic::Location;
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use serde_json::{Map, Value};

use super::event::LogEvent;
use super::severity::{Level, Severity};
use super::sink::{Sink, WriterSink};
use crate::env::Environment;
use crate::trace::enrich::{CloudTrace, Tracing};
use crate::trace::RequestContext;

static GLOBAL: LazyLock<ArcSwap<Logger>> =
    LazyLock::new(|| ArcSwap::from_pointee(Logger::from_env()));

/// Creates severity-stamped, trace-enriched [`LogEvent`]s and routes finished
/// records to its sinks.
///
/// Entries below [`Severity::Error`] go to the `out` sink. Error-report
/// severities go to the `err` sink and carry the call site of the logging call.
/// Constructors are `#[track_caller]`; wrappers that should not appear as the
/// call site annotate themselves `#[track_caller]` too.
#[derive(Clone)]
pub struct Logger {
    out: Arc<dyn Sink>,
    err: Arc<dyn Sink>,
    level: Level,
    environment: Environment,
    tracing: Arc<dyn Tracing>,
}

impl Logger {
    /// Creates a logger accepting every level, with no deployment identifiers.
    pub fn new(out: Arc<dyn Sink>, err: Arc<dyn Sink>) -> Self {
        Self {
            out,
            err,
            level: Level::Debug,
            environment: Environment::default(),
            tracing: Arc::new(CloudTrace),
        }
    }

    /// Stdout/stderr logger configured from `LOG_LEVEL` and the cached environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(WriterSink::stdout()), Arc::new(WriterSink::stderr()))
            .with_level(Level::from_env())
            .with_environment(Environment::global().clone())
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Replaces the enrichment strategy applied by the severity constructors.
    pub fn with_tracing(mut self, tracing: Arc<dyn Tracing>) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn with_out(mut self, out: Arc<dyn Sink>) -> Self {
        self.out = out;
        self
    }

    pub fn with_err(mut self, err: Arc<dyn Sink>) -> Self {
        self.err = err;
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.level.allows(severity.level())
    }

    /// Enriches `event` with the request data bound to `ctx`.
    pub fn with_trace(&self, ctx: &RequestContext, event: LogEvent) -> LogEvent {
        self.tracing.with_trace(ctx, event)
    }

    /// A `DEFAULT` entry. Not enriched.
    pub fn default(self: &Arc<Self>) -> LogEvent {
        LogEvent::new(self.clone(), Severity::Default)
    }

    pub fn debug(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.enriched(ctx, Severity::Debug)
    }

    pub fn info(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.enriched(ctx, Severity::Info)
    }

    pub fn notice(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.enriched(ctx, Severity::Notice)
    }

    pub fn warn(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.enriched(ctx, Severity::Warning)
    }

    #[track_caller]
    pub fn error(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.reported(ctx, Severity::Error, Location::caller())
    }

    #[track_caller]
    pub fn critical(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.reported(ctx, Severity::Critical, Location::caller())
    }

    /// Same as [`Logger::critical`]. Does not terminate the process.
    #[track_caller]
    pub fn fatal(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.reported(ctx, Severity::Critical, Location::caller())
    }

    #[track_caller]
    pub fn alert(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.reported(ctx, Severity::Alert, Location::caller())
    }

    #[track_caller]
    pub fn emergency(self: &Arc<Self>, ctx: &RequestContext) -> LogEvent {
        self.reported(ctx, Severity::Emergency, Location::caller())
    }

    fn enriched(self: &Arc<Self>, ctx: &RequestContext, severity: Severity) -> LogEvent {
        self.with_trace(ctx, LogEvent::new(self.clone(), severity))
    }

    fn reported(
        self: &Arc<Self>,
        ctx: &RequestContext,
        severity: Severity,
        location: &'static Location<'static>,
    ) -> LogEvent {
        self.with_trace(ctx, LogEvent::new(self.clone(), severity).caller(location))
    }

    pub(crate) fn write(&self, severity: Severity, record: &Map<String, Value>) {
        if !self.enabled(severity) {
            return;
        }
        if severity.is_error_report() {
            self.err.write(record);
        } else {
            self.out.write(record);
        }
    }
}

/// Current process-wide logger.
///
/// Initialized from the environment on first use.
pub fn global() -> Arc<Logger> {
    GLOBAL.load_full()
}

/// Replaces the process-wide logger.
///
/// Events already created keep the logger they were created with; only events
/// created after the swap observe the new one.
pub fn set_global(logger: Logger) {
    GLOBAL.store(Arc::new(logger));
}

/// Redirects non-error output of the process-wide logger.
pub fn set_global_out(out: Arc<dyn Sink>) {
    GLOBAL.rcu(|current| Arc::new(Logger::clone(current).with_out(out.clone())));
}

/// Redirects error-report output of the process-wide logger.
pub fn set_global_err(err: Arc<dyn Sink>) {
    GLOBAL.rcu(|current| Arc::new(Logger::clone(current).with_err(err.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{Fields, MemorySink};
    use crate::trace::TracingContext;
    use serde_json::json;

    fn logger() -> (Arc<Logger>, Arc<MemorySink>, Arc<MemorySink>) {
        let out = Arc::new(MemorySink::new());
        let err = Arc::new(MemorySink::new());
        let logger = Logger::new(out.clone(), err.clone())
            .with_environment(Environment::new("api", "myproj"));
        (Arc::new(logger), out, err)
    }

    #[test]
    fn test_severity_constructors() {
        let (logger, out, err) = logger();
        let ctx = RequestContext::background();

        logger.debug(&ctx).send();
        logger.info(&ctx).send();
        logger.notice(&ctx).send();
        logger.warn(&ctx).send();
        logger.default().send();
        logger.error(&ctx).send();
        logger.critical(&ctx).send();
        logger.fatal(&ctx).send();
        logger.alert(&ctx).send();
        logger.emergency(&ctx).send();

        let severities: Vec<_> = out
            .records()
            .iter()
            .map(|r| r["severity"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(severities, ["DEBUG", "INFO", "NOTICE", "WARNING", "DEFAULT"]);

        let reported = err.records();
        let severities: Vec<_> = reported
            .iter()
            .map(|r| r["severity"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            severities,
            ["ERROR", "CRITICAL", "CRITICAL", "ALERT", "EMERGENCY"]
        );
        for record in &reported {
            assert_eq!(record["@type"], crate::log::ERROR_REPORT_TYPE);
            assert!(record["caller"].as_str().unwrap().contains("logger.rs"));
        }
        for record in out.records() {
            assert!(record.get("@type").is_none());
            assert!(record.get("caller").is_none());
        }
    }

    #[track_caller]
    fn report_failure(logger: &Arc<Logger>, ctx: &RequestContext) {
        logger.error(ctx).msg("wrapped");
    }

    #[test]
    fn test_track_caller_wrapper_reports_call_site() {
        let (logger, _, err) = logger();
        let line = line!() + 1;
        report_failure(&logger, &RequestContext::background());

        let caller = err.records()[0]["caller"].as_str().unwrap().to_string();
        assert_eq!(caller, format!("{}:{}", file!(), line));
    }

    #[test]
    fn test_constructors_enrich_with_request_data() {
        let (logger, out, _) = logger();
        let ctx = RequestContext::background().with_tracing(TracingContext::new(
            "/users",
            "10.0.0.1",
            "req-1",
            "api",
        ));

        logger.info(&ctx).msg("enriched");
        logger.default().msg("plain");

        let records = out.records();
        assert_eq!(records[0]["request_id"], json!("req-1"));
        assert!(records[1].get("request_id").is_none());
    }

    #[test]
    fn test_level_suppresses_in_sink() {
        let (logger, out, err) = logger();
        let logger = Arc::new(Logger::clone(&logger).with_level(Level::Error));
        let ctx = RequestContext::background();

        logger.warn(&ctx).send();
        logger.error(&ctx).send();

        assert!(out.is_empty());
        assert_eq!(err.len(), 1);
    }
}
