//! Refresh Pipeline
//!
//! Timer-driven task that samples the source, asks the judge for a review,
//! folds the sample into the windowed aggregator and publishes the new
//! report on a single-slot watch channel.
//!
//! Lifecycle is `Idle → Running → Stopped`. The stop signal is a oneshot
//! owned by the `Running` state, so it can only ever be sent once.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::error::{FeedError, FeedResult};
use super::report::SharedReport;
use super::source::{Judge, Sample, Source};
use super::windows::WindowedAggregator;

/// Timing configuration for the refresh pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Time between cycles
    pub interval: Duration,
    /// Budget for fetch and judge together
    pub cycle_deadline: Duration,
    /// Budget for the judge alone; on expiry the sample is kept unannotated
    pub judge_timeout: Duration,
    /// How far back from now each fetch looks
    pub lookback: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            cycle_deadline: Duration::from_secs(30),
            judge_timeout: Duration::from_secs(20),
            lookback: Duration::from_secs(70),
        }
    }
}

enum Lifecycle {
    Idle(WindowedAggregator),
    Running {
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Periodic fetch → judge → aggregate → publish loop
pub struct Pipeline {
    config: PipelineConfig,
    lifecycle: Mutex<Lifecycle>,
    reports: Arc<watch::Sender<Option<SharedReport>>>,
}

impl Pipeline {
    /// Create an idle pipeline owning `aggregator`
    pub fn new(aggregator: WindowedAggregator, config: PipelineConfig) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            config,
            lifecycle: Mutex::new(Lifecycle::Idle(aggregator)),
            reports: Arc::new(reports),
        }
    }

    /// Create and start a pipeline in one step
    pub async fn spawn(
        aggregator: WindowedAggregator,
        config: PipelineConfig,
        source: Arc<dyn Source>,
        judge: Option<Arc<dyn Judge>>,
    ) -> FeedResult<Self> {
        let pipeline = Self::new(aggregator, config);
        pipeline.start(source, judge).await?;
        Ok(pipeline)
    }

    /// Launch the periodic task. The first cycle runs immediately.
    pub async fn start(
        &self,
        source: Arc<dyn Source>,
        judge: Option<Arc<dyn Judge>>,
    ) -> FeedResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let aggregator = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(aggregator) => aggregator,
            Lifecycle::Running { shutdown, handle } => {
                *lifecycle = Lifecycle::Running { shutdown, handle };
                tracing::warn!("Refresh pipeline start requested while running");
                return Err(FeedError::AlreadyStarted);
            }
            Lifecycle::Stopped => {
                tracing::warn!("Refresh pipeline start requested after stop");
                return Err(FeedError::AlreadyStopped);
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let cycle = Cycle {
            source,
            judge,
            config: self.config.clone(),
        };

        tracing::info!(
            interval = ?self.config.interval,
            cycle_deadline = ?self.config.cycle_deadline,
            judge = cycle.judge.is_some(),
            "Starting refresh pipeline"
        );

        let handle = tokio::spawn(run(
            cycle,
            aggregator,
            Arc::clone(&self.reports),
            shutdown_rx,
        ));
        *lifecycle = Lifecycle::Running {
            shutdown: shutdown_tx,
            handle,
        };
        Ok(())
    }

    /// Stop the periodic task and wait for it to exit.
    ///
    /// An in-flight cycle is abandoned without touching the aggregator.
    pub async fn stop(&self) -> FeedResult<()> {
        let (shutdown, handle) = {
            let mut lifecycle = self.lifecycle.lock().await;
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { shutdown, handle } => (shutdown, handle),
                Lifecycle::Idle(aggregator) => {
                    *lifecycle = Lifecycle::Idle(aggregator);
                    tracing::warn!("Refresh pipeline stop requested before start");
                    return Err(FeedError::NotRunning);
                }
                Lifecycle::Stopped => {
                    tracing::warn!("Refresh pipeline stop requested twice");
                    return Err(FeedError::AlreadyStopped);
                }
            }
        };

        // The task may already be gone if it panicked
        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Refresh pipeline task failed");
        }

        tracing::info!("Refresh pipeline stopped");
        Ok(())
    }

    /// Latest-value stream of reports.
    ///
    /// Holds `None` until the first successful cycle. An unread report is
    /// replaced by the next one.
    pub fn pull(&self) -> watch::Receiver<Option<SharedReport>> {
        self.reports.subscribe()
    }

    /// Most recently emitted report
    pub fn latest(&self) -> Option<SharedReport> {
        self.reports.borrow().clone()
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Running { .. })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// Everything one cycle needs besides the aggregator
struct Cycle {
    source: Arc<dyn Source>,
    judge: Option<Arc<dyn Judge>>,
    config: PipelineConfig,
}

impl Cycle {
    /// Fetch and judge under the cycle deadline.
    async fn run(&self) -> FeedResult<Sample> {
        let deadline = Instant::now() + self.config.cycle_deadline;
        match tokio::time::timeout_at(deadline, self.fetch_and_judge(deadline)).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::CycleTimeout(self.config.cycle_deadline)),
        }
    }

    async fn fetch_and_judge(&self, deadline: Instant) -> FeedResult<Sample> {
        let lookback = chrono::Duration::from_std(self.config.lookback)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let window_start = Utc::now() - lookback;

        let mut sample = self.source.fetch_top(window_start).await?;
        tracing::debug!(size = sample.size, user = %sample.user, "Fetched top change");

        let Some(judge) = &self.judge else {
            return Ok(sample);
        };

        let prompt = sample.review_prompt();
        match tokio::time::timeout(self.config.judge_timeout, judge.annotate(deadline, &prompt))
            .await
        {
            Ok(Ok(review)) => sample.review = Some(review),
            Ok(Err(e)) => {
                let e = FeedError::JudgeUnavailable(e);
                tracing::warn!(error = %e, "Keeping sample without review");
            }
            Err(_) => {
                let e = FeedError::JudgeTimeout(self.config.judge_timeout);
                tracing::warn!(error = %e, "Keeping sample without review");
            }
        }

        Ok(sample)
    }
}

async fn run(
    cycle: Cycle,
    mut aggregator: WindowedAggregator,
    reports: Arc<watch::Sender<Option<SharedReport>>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(cycle.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::debug!("Abandoning in-flight refresh cycle");
                break;
            }
            outcome = cycle.run() => outcome,
        };

        match outcome {
            Ok(sample) => {
                aggregator.update(sample);
                if let Some(report) = aggregator.report() {
                    let (short, medium, long) = report.sizes();
                    reports.send_replace(Some(Arc::new(report)));
                    tracing::info!(short, medium, long, "Top diff updated");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping refresh cycle");
            }
        }
    }

    tracing::debug!("Refresh pipeline loop exited");
}
