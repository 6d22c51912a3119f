//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::broker::Broker;
use crate::feed::SharedReport;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Broker fanning reports out to `/notify` clients
    pub broker: Arc<Broker<SharedReport>>,
    /// Most recent report from the pipeline
    pub reports: watch::Receiver<Option<SharedReport>>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        broker: Arc<Broker<SharedReport>>,
        reports: watch::Receiver<Option<SharedReport>>,
        config: ApiConfig,
    ) -> Self {
        Self {
            broker,
            reports,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Snapshot of the latest report, if one was built yet
    pub fn latest_report(&self) -> Option<SharedReport> {
        self.reports.borrow().clone()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory served under `/view`
    pub static_dir: PathBuf,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("./static"),
            keep_alive: Duration::from_secs(15),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
