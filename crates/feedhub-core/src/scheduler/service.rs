use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::storage::Database;

use super::tasks::aggregate_all_feeds;

/// Events emitted by the scheduler for observers (e.g. the daemon's
/// status endpoint)
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A sweep over all feeds finished
    FeedsAggregated { new_articles: u32 },
    /// A background sweep failed outright
    Error { message: String },
}

/// Background service that periodically re-aggregates every feed
pub struct SchedulerService {
    db: Arc<Database>,
    config: Arc<AppConfig>,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl SchedulerService {
    pub fn new(db: Arc<Database>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            config,
            event_tx: None,
        }
    }

    /// Set the event sender for observers
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Run the aggregation loop until the shutdown signal flips
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval_secs = self.config.sync.aggregate_interval_secs;

        if interval_secs == 0 {
            info!("Background scheduler disabled (aggregate_interval_secs = 0)");
            let _ = shutdown.changed().await;
            return;
        }

        info!("Scheduler started: aggregate every {}s", interval_secs);

        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick fires immediately; skip it
        interval.tick().await;

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_ok() && *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    debug!("Running scheduled aggregation sweep");
                    match aggregate_all_feeds(&self.db, &self.config).await {
                        Ok(new_articles) => {
                            if new_articles > 0 {
                                info!("Scheduled sweep linked {} new articles", new_articles);
                            }
                            self.send_event(SchedulerEvent::FeedsAggregated { new_articles });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Scheduled aggregation sweep failed");
                            self.send_event(SchedulerEvent::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}
