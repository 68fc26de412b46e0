use crate::application::agent::collector::MetricsCollector;
use crate::application::agent::dispatcher::{Dispatcher, JobOutcome};
use crate::application::agent::sender::MetricSender;
use crate::config::AgentConfig;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives the agent: polls on one schedule, reports on another, and pushes
/// every report through the dispatcher's bounded pool.
pub struct AgentRunner {
    config: AgentConfig,
    collector: Arc<Mutex<MetricsCollector>>,
    sender: MetricSender,
    dispatcher: Arc<Dispatcher>,
}

impl AgentRunner {
    pub fn new(config: AgentConfig) -> Self {
        let sender = MetricSender::new(&config.address, config.key().map(str::to_string));
        let dispatcher = Arc::new(Dispatcher::new(config.rate_limit));
        Self {
            config,
            collector: Arc::new(Mutex::new(MetricsCollector::new())),
            sender,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Run until `shutdown` fires. Reports still waiting for a slot are
    /// dropped; reports already sending are awaited.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.dispatcher.start()?;
        info!(
            "Agent reporting to {} every {:?} (poll {:?}, rate limit {}, mode {:?})",
            self.config.address,
            self.config.report_interval,
            self.config.poll_interval,
            self.dispatcher.rate_limit(),
            self.config.send_mode
        );

        let poller = tokio::spawn(Self::poll_loop(
            self.collector.clone(),
            self.config.poll_interval,
            shutdown.clone(),
        ));

        let mut reports = JoinSet::new();
        let mut ticker = interval(self.config.report_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first report
        // carries at least one poll.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let metrics = match self.collector.lock() {
                        Ok(mut collector) => collector.take_report(),
                        Err(_) => {
                            error!("Metrics collector lock poisoned; stopping agent");
                            break;
                        }
                    };
                    let sender = self.sender.clone();
                    let dispatcher = self.dispatcher.clone();
                    let collector = self.collector.clone();
                    let mode = self.config.send_mode;
                    let cancel = shutdown.clone();
                    reports.spawn(async move {
                        let count = metrics.len();
                        let outcome = dispatcher.submit(sender.send(mode, &metrics), &cancel).await;
                        let delivered = match outcome {
                            Ok(JobOutcome::Completed) => {
                                debug!("Reported {} metrics", count);
                                true
                            }
                            Ok(JobOutcome::Failed(e)) => {
                                warn!("Report of {} metrics failed: {:#}", count, e);
                                false
                            }
                            Ok(JobOutcome::Cancelled) => {
                                debug!("Report dropped on shutdown");
                                false
                            }
                            Err(e) => {
                                warn!("Report not dispatched: {}", e);
                                false
                            }
                        };
                        // Undelivered polls count toward the next report
                        if !delivered {
                            if let Ok(mut collector) = collector.lock() {
                                collector.restore_unsent(&metrics);
                            }
                        }
                    });
                }
                // Reap finished report tasks so the set does not grow unbounded
                Some(_) = reports.join_next(), if !reports.is_empty() => {}
            }
        }

        info!("Agent shutting down...");
        self.dispatcher.close();
        while reports.join_next().await.is_some() {}
        if let Err(e) = poller.await {
            warn!("Poll loop ended abnormally: {}", e);
        }
        info!("Agent stopped.");
        Ok(())
    }

    async fn poll_loop(
        collector: Arc<Mutex<MetricsCollector>>,
        period: std::time::Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    let collector = collector.clone();
                    // sysinfo refreshes read procfs; keep them off the async workers
                    let polled = tokio::task::spawn_blocking(move || {
                        if let Ok(mut collector) = collector.lock() {
                            collector.poll();
                        }
                    })
                    .await;
                    if let Err(e) = polled {
                        error!("Metric poll failed: {}", e);
                    }
                }
            }
        }
    }
}
