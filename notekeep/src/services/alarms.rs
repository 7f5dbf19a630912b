//! Alarm service
//!
//! One-shot wake-up triggers for reminders, backed by tokio-cron-scheduler.
//! Each trigger identity maps to at most one pending job; fired jobs hand
//! their payload to a NotificationPort and forget themselves.

use crate::error::{AppError, Result};
use crate::services::notifications::NotificationPort;
use crate::services::trigger::{TriggerId, TriggerPayload};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// OS-level one-shot wake timer service
#[async_trait]
pub trait AlarmPort: Send + Sync {
    /// Register (or replace) the trigger for `trigger`.
    ///
    /// A time that already elapsed may fire immediately or be rejected.
    /// Fails with `CapabilityDenied` when exact scheduling is not allowed.
    async fn register(&self, trigger: TriggerId, when_millis: i64, payload: TriggerPayload)
        -> Result<()>;

    /// Cancel a trigger. Cancelling an unknown identity is a no-op.
    async fn cancel(&self, trigger: TriggerId) -> Result<()>;
}

type JobTable = Arc<RwLock<HashMap<TriggerId, Uuid>>>;

/// In-process alarm service
#[derive(Clone)]
pub struct JobSchedulerAlarms {
    scheduler: Arc<RwLock<JobScheduler>>,
    jobs: JobTable,
    notifier: Arc<dyn NotificationPort>,
    exact_allowed: Arc<AtomicBool>,
}

impl JobSchedulerAlarms {
    /// Create new alarm service
    pub async fn new(notifier: Arc<dyn NotificationPort>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            notifier,
            exact_allowed: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Start firing jobs
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Alarm scheduler started");
        Ok(())
    }

    /// Grant or revoke exact scheduling, as the platform would
    pub fn set_exact_alarms_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
        tracing::info!("Exact alarms allowed: {}", allowed);
    }

    /// Identities with a pending job
    pub async fn live_triggers(&self) -> Vec<TriggerId> {
        let mut live: Vec<TriggerId> = self.jobs.read().await.keys().copied().collect();
        live.sort();
        live
    }

    /// Shutdown scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to shutdown scheduler: {}", e)))?;
        self.jobs.write().await.clear();
        tracing::info!("Alarm scheduler shutdown");
        Ok(())
    }
}

#[async_trait]
impl AlarmPort for JobSchedulerAlarms {
    async fn register(
        &self,
        trigger: TriggerId,
        when_millis: i64,
        payload: TriggerPayload,
    ) -> Result<()> {
        if !self.exact_allowed.load(Ordering::SeqCst) {
            return Err(AppError::CapabilityDenied(
                "exact alarms are not permitted".to_string(),
            ));
        }

        // Same identity replaces the pending job
        self.cancel(trigger).await?;

        // Elapsed times fire on the next tick
        let delay_ms = (when_millis - Utc::now().timestamp_millis()).max(0) as u64;

        let jobs = Arc::clone(&self.jobs);
        let notifier = Arc::clone(&self.notifier);

        let job = Job::new_one_shot_async(Duration::from_millis(delay_ms), move |job_id, _l| {
            let jobs = Arc::clone(&jobs);
            let notifier = Arc::clone(&notifier);
            let payload = payload.clone();
            Box::pin(async move {
                {
                    let mut table = jobs.write().await;
                    if table.get(&trigger) == Some(&job_id) {
                        table.remove(&trigger);
                    }
                }

                tracing::info!("Trigger {} fired", trigger);

                if let Err(e) = notifier.deliver(payload).await {
                    tracing::error!("Failed to deliver reminder {}: {}", trigger, e);
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create trigger job: {}", e)))?;

        let job_id = job.guid();

        // Recorded before the job is added so a zero-delay job finds its entry
        self.jobs.write().await.insert(trigger, job_id);

        let added = {
            let scheduler = self.scheduler.read().await;
            scheduler.add(job).await
        };

        if let Err(e) = added {
            self.jobs.write().await.remove(&trigger);
            return Err(AppError::Scheduler(format!(
                "Failed to schedule trigger {}: {}",
                trigger, e
            )));
        }

        tracing::debug!(
            "Registered trigger {} (request code {}) in {} ms",
            trigger,
            trigger.request_code(),
            delay_ms
        );
        Ok(())
    }

    async fn cancel(&self, trigger: TriggerId) -> Result<()> {
        let job_id = self.jobs.write().await.remove(&trigger);

        if let Some(job_id) = job_id {
            let scheduler = self.scheduler.read().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| AppError::Scheduler(format!("Failed to remove trigger: {}", e)))?;
            tracing::debug!("Cancelled trigger {}", trigger);
        }

        Ok(())
    }
}
