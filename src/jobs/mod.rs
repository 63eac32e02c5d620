//! Background job scheduling

pub mod album_refresh;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::services::ServicesManager;
use crate::services::manager::{Service, ServiceHealth};

/// Configuration for the periodic album refresh
#[derive(Debug, Clone)]
pub struct RefreshSchedulerConfig {
    /// Time between refreshes
    pub interval: Duration,
}

/// Runs the album refresh job on a fixed interval.
pub struct RefreshScheduler {
    manager: Arc<ServicesManager>,
    interval: Duration,
    /// Set in start(), taken in stop().
    scheduler: Mutex<Option<JobScheduler>>,
}

impl RefreshScheduler {
    pub fn new(manager: Arc<ServicesManager>, config: RefreshSchedulerConfig) -> Self {
        Self {
            manager,
            interval: config.interval,
            scheduler: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Service for RefreshScheduler {
    fn name(&self) -> &str {
        "scheduler"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["album_picker".to_string()]
    }

    async fn start(&self) -> Result<()> {
        let picker = self
            .manager
            .get_album_picker()
            .await
            .ok_or_else(|| anyhow!("album picker service not available"))?;

        let scheduler = JobScheduler::new().await?;

        let refresh_job = Job::new_repeated_async(self.interval, move |_uuid, _l| {
            let picker = picker.clone();
            Box::pin(async move {
                info!("Running album refresh");
                if let Err(e) = album_refresh::run_refresh(picker).await {
                    tracing::error!("Album refresh error: {:#}", e);
                }
            })
        })?;
        let job_id = scheduler.add(refresh_job).await?;

        scheduler.start().await?;
        *self.scheduler.lock().await = Some(scheduler);

        info!(
            service = "scheduler",
            job_id = %job_id,
            interval_secs = self.interval.as_secs(),
            "Album refresh scheduled"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let scheduler = self.scheduler.lock().await.take();
        if let Some(mut scheduler) = scheduler {
            scheduler.shutdown().await?;
        }
        info!(service = "scheduler", "Job scheduler stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        if self.scheduler.lock().await.is_some() {
            Ok(ServiceHealth::healthy())
        } else {
            Ok(ServiceHealth::unhealthy("scheduler not running"))
        }
    }
}
