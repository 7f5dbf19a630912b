//! Boot reconciliation
//!
//! Pending triggers do not survive a restart of the alarm service, so on
//! startup every trigger is derived again from the persisted records.

use crate::database::Repository;
use crate::error::Result;
use crate::services::attachments::AttachmentStore;
use crate::services::reminders::ReminderScheduler;

/// Totals from one boot reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    pub records_scanned: usize,
    pub triggers_registered: usize,
    pub skipped_past: usize,
    pub failed: usize,
    pub grants_released: usize,
}

/// Re-registers every future trigger from the store
#[derive(Clone)]
pub struct BootReconciler {
    repo: Repository,
    reminders: ReminderScheduler,
    attachments: AttachmentStore,
}

impl BootReconciler {
    pub fn new(repo: Repository, reminders: ReminderScheduler, attachments: AttachmentStore) -> Self {
        Self {
            repo,
            reminders,
            attachments,
        }
    }

    /// Schedule every record with a non-empty reminder list.
    ///
    /// Fails only if the records cannot be loaded.
    pub async fn reschedule_all(&self) -> Result<BootReport> {
        let records = self.repo.list_all().await?;
        let mut report = BootReport {
            records_scanned: records.len(),
            ..BootReport::default()
        };

        for record in records.iter().filter(|r| !r.reminder_timestamps.is_empty()) {
            let scheduled = self.reminders.schedule(record).await;
            report.triggers_registered += scheduled.registered.len();
            report.skipped_past += scheduled.skipped_past;
            report.failed += scheduled.failed;
        }

        tracing::info!(
            "Boot reconciliation: {} record(s), {} trigger(s) registered, {} failed",
            report.records_scanned,
            report.triggers_registered,
            report.failed
        );

        Ok(report)
    }

    /// Full startup pass: triggers, then orphaned grants.
    ///
    /// A grant pass that fails on an unreachable store fails the run; any
    /// other grant failure is logged.
    pub async fn run(&self) -> Result<BootReport> {
        let mut report = self.reschedule_all().await?;

        let records = self.repo.list_all().await?;
        match self.attachments.reconcile_grants(&records).await {
            Ok(released) => report.grants_released = released,
            Err(e) if e.is_store_unavailable() => return Err(e),
            Err(e) => tracing::warn!("Grant reconciliation failed: {}", e),
        }

        Ok(report)
    }
}
