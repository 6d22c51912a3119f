//! # widiff
//!
//! Live feed of the largest Wikipedia edits. Every interval the refresh
//! pipeline finds the biggest recent change, optionally has it reviewed like
//! a pull request, and keeps the largest change seen per minute, hour and
//! day. Each new report is fanned out to every connected client.
//!
//! ## Modules
//!
//! - [`feed`]: ring buffers, windowed aggregation and the refresh pipeline
//! - [`broker`]: generic publish/subscribe fan-out
//! - [`wiki`]: MediaWiki API source
//! - [`judge`]: Gemini reviewer
//! - [`api`]: HTTP and SSE server with Axum
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use widiff::broker::{Broker, BrokerConfig};
//! use widiff::feed::{forward_reports, Pipeline, PipelineConfig, WindowCapacities, WindowedAggregator};
//! use widiff::wiki::{WikiClient, WikiConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let aggregator = WindowedAggregator::new(WindowCapacities::default())?;
//!     let source = Arc::new(WikiClient::new(WikiConfig::default())?);
//!     let pipeline = Pipeline::spawn(aggregator, PipelineConfig::default(), source, None).await?;
//!
//!     let broker = Arc::new(Broker::new(BrokerConfig::default()));
//!     broker.start().await?;
//!     forward_reports(pipeline.pull(), Arc::clone(&broker));
//!
//!     let mut subscription = broker.subscribe().await?;
//!     if let Some(report) = subscription.recv().await {
//!         println!("largest edit this minute: {} bytes", report.short.size);
//!     }
//!
//!     pipeline.stop().await?;
//!     broker.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod broker;
pub mod config;
pub mod feed;
pub mod judge;
pub mod wiki;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};
pub use broker::{Broker, BrokerConfig, BrokerError, Subscription};
pub use config::{Config, ConfigError};
pub use feed::{
    FeedError, Pipeline, PipelineConfig, Report, RingBuffer, Sample, SharedReport,
    WindowCapacities, WindowedAggregator,
};
