//! Periodic queue sweep driving the delivery pipeline.

use std::{sync::Arc, time::{Duration, SystemTime}};

use ferrier_common::Signal;
use ferrier_queue::QueueStore;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{config::SchedulerConfig, orchestrator::DeliveryOrchestrator};

/// Interval-driven scheduler.
///
/// Every period it requeues abandoned `InProgress` messages, claims a
/// batch of due messages, and hands each one to the orchestrator in
/// turn. One message's failure never stops the rest of the batch.
#[derive(Debug)]
pub struct Scheduler {
    store: Arc<dyn QueueStore>,
    orchestrator: Arc<DeliveryOrchestrator>,
    config: SchedulerConfig,
}

impl Scheduler {
    #[must_use]
    pub const fn new(
        store: Arc<dyn QueueStore>,
        orchestrator: Arc<DeliveryOrchestrator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    /// Sweep the queue until a shutdown signal arrives.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<Signal>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.period_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            period_secs = self.config.period_secs,
            batch_size = self.config.batch_size,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// One sweep: recover stale leases, claim due messages, deliver them.
    pub async fn tick(&self) {
        let now = SystemTime::now();
        let lease = Duration::from_secs(self.config.lease_secs);

        match self.store.recover_stale(lease, now).await {
            Ok(0) => {}
            Ok(recovered) => warn!(recovered, "Requeued messages with expired leases"),
            Err(e) => error!(error = %e, "Lease recovery failed"),
        }

        let claimed = match self.store.claim_due(self.config.batch_size, now).await {
            Ok(claimed) => claimed,
            Err(e) => {
                error!(error = %e, "Claiming due messages failed");
                return;
            }
        };

        if claimed.is_empty() {
            return;
        }

        debug!(count = claimed.len(), "Processing claimed messages");

        for message in claimed {
            let id = message.id;
            if let Err(e) = self.orchestrator.deliver(message).await {
                error!(id = %id, error = %e, "Could not record delivery outcome");
            }
        }
    }
}
