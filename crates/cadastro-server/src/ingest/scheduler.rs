//! Periodic ingestion trigger

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::orchestrator::IngestOrchestrator;

/// Runs a discovery pass every `interval` until shutdown
///
/// The first pass starts immediately. Passes never overlap: a pass that runs
/// longer than the interval pushes the next one back instead of queueing a
/// burst of catch-up passes.
pub struct Scheduler {
    orchestrator: Arc<IngestOrchestrator>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<IngestOrchestrator>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            interval,
            shutdown,
        }
    }

    /// Spawn the trigger loop
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_ms = self.interval.as_millis() as u64,
                "Ingestion scheduler started"
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let summary = self.orchestrator.run_pass().await;
                        debug!(
                            processed = summary.processed(),
                            failed = summary.failed(),
                            "Scheduled pass complete"
                        );
                    },
                }
            }

            info!("Ingestion scheduler stopped");
        })
    }
}
