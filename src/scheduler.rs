use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::refresher::{PriceRefresher, RefreshSummary};
use crate::sheets::SheetStore;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    /// Ticks dropped because the previous pass was still running.
    pub skipped_ticks: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_summary: Option<RefreshSummary>,
}

/// Runs a full sheet refresh on a cron schedule (UTC).
pub struct RefreshScheduler {
    scheduler: JobScheduler,
    refresher: Arc<PriceRefresher>,
    store: Arc<dyn SheetStore>,
    stats: Arc<RwLock<SchedulerStats>>,
    running: Arc<Mutex<()>>,
    config: SchedulerConfig,
    job_id: Option<Uuid>,
    start_time: DateTime<Utc>,
}

impl RefreshScheduler {
    pub async fn new(
        refresher: Arc<PriceRefresher>,
        store: Arc<dyn SheetStore>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            refresher,
            store,
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            running: Arc::new(Mutex::new(())),
            config,
            job_id: None,
            start_time: Utc::now(),
        })
    }

    /// Registers the refresh job and starts ticking.
    pub async fn start(&mut self) -> Result<()> {
        if self.job_id.is_some() {
            return Err(AppError::Scheduler("scheduler already started".into()));
        }

        let refresher = Arc::clone(&self.refresher);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(self.config.cron.as_str(), move |_uuid, _l| {
            let refresher = Arc::clone(&refresher);
            let store = Arc::clone(&store);
            let stats = Arc::clone(&stats);
            let running = Arc::clone(&running);

            Box::pin(async move {
                if let Err(e) = Self::execute(refresher, store, stats, running).await {
                    tracing::warn!("Scheduled refresh did not run: {}", e);
                }
            })
        })?;

        self.job_id = Some(self.scheduler.add(job).await?);
        self.scheduler.start().await?;
        tracing::info!("Refresh scheduler started with cron: {}", self.config.cron);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        // Let an in-flight pass finish so the sheet is not left cleared.
        let _running = self.running.lock().await;
        self.scheduler.shutdown().await?;
        self.job_id = None;

        let uptime = Utc::now().signed_duration_since(self.start_time);
        tracing::info!(
            "Refresh scheduler shutdown after {}s",
            uptime.num_seconds().max(0)
        );
        Ok(())
    }

    /// Runs a pass immediately, outside of the schedule.
    pub async fn run_now(&self) -> Result<RefreshSummary> {
        tracing::info!("Running immediate refresh");
        Self::execute(
            Arc::clone(&self.refresher),
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
            Arc::clone(&self.running),
        )
        .await
    }

    pub async fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    async fn execute(
        refresher: Arc<PriceRefresher>,
        store: Arc<dyn SheetStore>,
        stats: Arc<RwLock<SchedulerStats>>,
        running: Arc<Mutex<()>>,
    ) -> Result<RefreshSummary> {
        let Ok(_guard) = running.try_lock() else {
            stats.write().await.skipped_ticks += 1;
            return Err(AppError::Scheduler("a refresh is already running".into()));
        };

        let started = Utc::now();
        let result = refresher.refresh_sheet(store.as_ref()).await;

        let mut stats = stats.write().await;
        stats.run_count += 1;
        stats.last_run = Some(started);
        match &result {
            Ok(summary) => {
                stats.success_count += 1;
                stats.last_error = None;
                stats.last_summary = Some(summary.clone());
            }
            Err(e) => {
                tracing::error!("Refresh failed: {}", e);
                stats.error_count += 1;
                stats.last_error = Some(e.to_string());
            }
        }

        result
    }
}
