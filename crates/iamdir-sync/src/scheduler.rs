//! Fixed-period driver for the reconciliation engine
//!
//! Cycles run one at a time on a dedicated task. When a cycle overruns the
//! period the next one starts as soon as it finishes; no tick is dropped.
//! Shutdown stops future cycles and never interrupts the one in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use iamdir_core::{IamDirError, ReconciliationReport, Result};

use crate::config::SchedulerConfig;
use crate::engine::ReconciliationEngine;

pub struct SyncScheduler {
    period: Duration,
    initial_delay: Duration,
}

impl SyncScheduler {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            period: config.period(),
            initial_delay: config.initial_delay(),
        })
    }

    /// Spawn the polling task. Dropping the handle also stops the schedule.
    pub fn start(&self, mut engine: ReconciliationEngine) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let last_report: Arc<RwLock<Option<ReconciliationReport>>> = Arc::new(RwLock::new(None));
        let reports = last_report.clone();

        let period = self.period;
        let initial_delay = self.initial_delay;
        info!(
            period_secs = period.as_secs(),
            initial_delay_secs = initial_delay.as_secs(),
            "Starting IAM poller"
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *shutdown_rx.borrow() {
                    break;
                }

                match engine.run_cycle().await {
                    Ok(report) => *reports.write().await = Some(report),
                    Err(e) => {
                        error!("Cancelling scheduled polling: {}", e);
                        return Err(e);
                    }
                }
            }

            info!("IAM poller stopped");
            Ok(())
        });

        SchedulerHandle {
            shutdown,
            task,
            last_report,
        }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
    last_report: Arc<RwLock<Option<ReconciliationReport>>>,
}

impl SchedulerHandle {
    /// Stop scheduling new cycles
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Report of the most recent completed cycle
    pub async fn last_report(&self) -> Option<ReconciliationReport> {
        self.last_report.read().await.clone()
    }

    /// True once the polling task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the polling task; returns the bootstrap error that stopped it, if any
    pub async fn join(self) -> Result<()> {
        self.stop_on(std::future::pending()).await
    }

    /// Run until `signal` resolves or the poller exits on its own, then wait
    /// for the in-flight cycle
    pub async fn stop_on<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        // The sender stays alive until the task exits; dropping it stops the loop.
        let Self {
            shutdown, mut task, ..
        } = self;
        let outcome = tokio::select! {
            outcome = &mut task => outcome,
            _ = signal => {
                info!("Shutdown requested, waiting for the current cycle");
                let _ = shutdown.send(true);
                task.await
            }
        };
        drop(shutdown);
        outcome.map_err(|e| IamDirError::internal_error(format!("poller task failed: {}", e)))?
    }
}
