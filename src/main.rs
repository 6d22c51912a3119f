//! widiff server
//!
//! Samples the largest recent Wikipedia edit every interval, keeps the
//! largest per minute, hour and day, and serves them over HTTP and SSE.
//!
//! Run with: `widiff serve --config widiff.toml`

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use widiff::api::{serve, AppState};
use widiff::broker::{Broker, BrokerError};
use widiff::config::{generate_default_config, Config, LoggingConfig};
use widiff::feed::{forward_reports, Judge, Pipeline, SharedReport, Source, WindowedAggregator};
use widiff::judge::GeminiJudge;
use widiff::wiki::WikiClient;

#[derive(Parser)]
#[command(name = "widiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live feed of the largest Wikipedia edits, reviewed like pull requests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the refresh pipeline and HTTP server (default)
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print an annotated default config file
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { config: None }) {
        Commands::Config => {
            print!("{}", generate_default_config());
            Ok(())
        }
        Commands::Serve { config } => {
            let config = Config::resolve(config.as_deref()).context("loading configuration")?;
            init_logging(&config.logging);
            run(config).await
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("widiff={},tower_http=info", config.level)));
    let json = config.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();
}

async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    tracing::info!("Starting widiff v{}", env!("CARGO_PKG_VERSION"));

    let capacities = config.window_capacities()?;
    tracing::info!(
        short = capacities.short,
        medium = capacities.medium,
        long = capacities.long,
        "Window capacities"
    );
    let aggregator = WindowedAggregator::new(capacities)?;

    let source: Arc<dyn Source> = Arc::new(WikiClient::new(config.wiki_config())?);
    let judge: Option<Arc<dyn Judge>> = match config.gemini_config() {
        Some(gemini) => {
            tracing::info!(model = %gemini.model, "Gemini reviews enabled");
            Some(Arc::new(GeminiJudge::new(gemini)?))
        }
        None => {
            tracing::info!("Gemini reviews disabled (set GEMINI_API_KEY to enable)");
            None
        }
    };

    let broker: Arc<Broker<SharedReport>> = Arc::new(Broker::new(config.broker_config()));
    broker.start().await?;

    let pipeline = Pipeline::spawn(aggregator, config.pipeline(), source, judge).await?;
    let forwarder = forward_reports(pipeline.pull(), Arc::clone(&broker));

    let server_config = config.server_config();
    let state = AppState::new(Arc::clone(&broker), pipeline.pull(), server_config.clone());
    let served = serve(state, &server_config).await;

    tracing::info!("Stopping refresh pipeline...");
    if let Err(e) = pipeline.stop().await {
        tracing::warn!(error = %e, "Pipeline stop failed");
    }
    // Dropping the pipeline closes the report channel and ends the forwarder
    drop(pipeline);
    if let Err(e) = forwarder.await {
        tracing::warn!(error = %e, "Report forwarder panicked");
    }

    // Normally already stopped by the server's shutdown hook
    match broker.stop().await {
        Ok(()) | Err(BrokerError::AlreadyStopped) => {}
        Err(e) => tracing::warn!(error = %e, "Broker stop failed"),
    }

    served?;
    tracing::info!("widiff stopped");
    Ok(())
}
