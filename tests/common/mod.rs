#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, extract::ConnectInfo, http::Request};
use serde_json::Value;
use stackdriver::config::Config;
use stackdriver::env::Environment;
use stackdriver::log::{Level, Logger, MemorySink};

/// Logger writing into two in-memory sinks.
pub struct TestLogger {
    pub logger: Arc<Logger>,
    pub out: Arc<MemorySink>,
    pub err: Arc<MemorySink>,
}

impl TestLogger {
    pub fn new(environment: Environment) -> Self {
        Self::with_level(environment, Level::Debug)
    }

    pub fn with_level(environment: Environment, level: Level) -> Self {
        let out = Arc::new(MemorySink::default());
        let err = Arc::new(MemorySink::default());
        let logger = Logger::new(out.clone(), err.clone())
            .with_level(level)
            .with_environment(environment);
        Self {
            logger: Arc::new(logger),
            out,
            err,
        }
    }

    /// Records with the given severity written to the out sink.
    pub fn out_with_severity(&self, severity: &str) -> Vec<Value> {
        self.out
            .records()
            .into_iter()
            .filter(|r| r["severity"] == severity)
            .collect()
    }
}

pub fn cloud_run() -> Environment {
    Environment::new("api", "myproj")
}

pub fn test_config() -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        trace_dump: false,
        trace_export: false,
        access_log_skip: vec!["/healthz".to_string()],
        service_version: "0.1.0".to_string(),
        profiler_retry: None,
    }
}

/// Request arriving from `peer`, as seen behind `into_make_service_with_connect_info`.
pub fn request_from(peer: &str, builder: axum::http::request::Builder) -> Request<Body> {
    let mut req = builder.body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    req
}
