use crate::{context::AppContext, metrics};
use std::{sync::Arc, time::Instant};
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        let purge_interval = self.context.config.cache.purge_interval_secs;
        if purge_interval == 0 {
            info!("Cache purge job disabled");
            return;
        }

        info!("Starting background job scheduler");
        tokio::spawn(Self::cache_purge_job(
            Arc::clone(&self),
            Duration::from_secs(purge_interval),
        ));
    }

    /// Purge expired caller name rows
    async fn cache_purge_job(scheduler: Arc<Self>, period: Duration) {
        let mut interval = interval(period);

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::purge_expired_cache(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} expired caller name entries", count);
                    }
                    metrics::record_background_job(
                        "cache_purge",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Failed to purge caller name cache: {}", e);
                    metrics::record_background_job(
                        "cache_purge",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }
}
