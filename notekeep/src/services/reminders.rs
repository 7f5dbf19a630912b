//! Reminders service
//!
//! Keeps the alarm service's pending triggers for a record equal to the
//! future timestamps in that record's reminder list.
//!
//! Edits cancel everything the old list implied and then schedule the new
//! list. Per-reminder failures are logged and skipped; the boot reconciler
//! picks up anything missed.

use crate::config::{FALLBACK_NOTIFICATION_BODY, FALLBACK_NOTIFICATION_TITLE};
use crate::database::Record;
use crate::error::Result;
use crate::services::alarms::AlarmPort;
use crate::services::settings::ReminderSettings;
use crate::services::trigger::{TriggerId, TriggerPayload};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome of scheduling one record's reminders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub registered: Vec<TriggerId>,
    pub skipped_past: usize,
    pub failed: usize,
}

/// Maps record reminders onto alarm triggers
#[derive(Clone)]
pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmPort>,
    settings: ReminderSettings,
}

impl ReminderScheduler {
    pub fn new(alarms: Arc<dyn AlarmPort>, settings: ReminderSettings) -> Self {
        Self {
            alarms,
            settings: settings.validated(),
        }
    }

    /// Whether `timestamp` still deserves a trigger at `now_millis`
    pub fn is_upcoming(&self, timestamp: i64, now_millis: i64) -> bool {
        timestamp > now_millis - self.settings.skew_tolerance_ms
    }

    /// Register one trigger per upcoming reminder of `record`
    pub async fn schedule(&self, record: &Record) -> ScheduleReport {
        self.schedule_at(record, Utc::now().timestamp_millis()).await
    }

    /// `schedule` against an explicit clock reading
    pub async fn schedule_at(&self, record: &Record, now_millis: i64) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        if !record.is_persisted() {
            tracing::warn!("Refusing to schedule reminders for an unsaved item");
            return report;
        }

        for &timestamp in &record.reminder_timestamps {
            if !self.is_upcoming(timestamp, now_millis) {
                tracing::debug!(
                    "Skipping past reminder {} for item {}",
                    format_millis(timestamp),
                    record.id
                );
                report.skipped_past += 1;
                continue;
            }

            match self.register(record, timestamp).await {
                Ok(trigger) => report.registered.push(trigger),
                Err(_) => report.failed += 1,
            }
        }

        tracing::info!(
            "Scheduled {} reminder(s) for item {} ({} past, {} failed)",
            report.registered.len(),
            record.id,
            report.skipped_past,
            report.failed
        );

        report
    }

    /// Cancel the trigger of every reminder of `record`, past or future.
    ///
    /// Returns how many cancels the alarm service accepted.
    pub async fn cancel_all(&self, record: &Record) -> usize {
        let mut cancelled = 0;

        for &timestamp in &record.reminder_timestamps {
            if self.cancel_one(record.id, timestamp).await.is_ok() {
                cancelled += 1;
            }
        }

        tracing::debug!(
            "Cancelled {} trigger(s) for item {}",
            cancelled,
            record.id
        );

        cancelled
    }

    /// Cancel the trigger for a single reminder
    pub async fn cancel_one(&self, record_id: i64, timestamp: i64) -> Result<()> {
        let trigger = TriggerId::derive(record_id, timestamp);
        self.alarms.cancel(trigger).await.map_err(|e| {
            tracing::warn!("Failed to cancel trigger {}: {}", trigger, e);
            e
        })
    }

    /// Make the live triggers match `new` regardless of what `old` had
    pub async fn reconcile_on_edit(&self, old: &Record, new: &Record) -> ScheduleReport {
        self.cancel_all(old).await;
        self.schedule(new).await
    }

    /// Append a reminder while editing.
    ///
    /// Persisted records get their trigger registered right away so the
    /// reminder works without waiting for a save.
    pub async fn add_reminder(&self, record: &mut Record, timestamp: i64) -> Option<TriggerId> {
        record.reminder_timestamps.push(timestamp);

        if !record.is_persisted() {
            return None;
        }

        if !self.is_upcoming(timestamp, Utc::now().timestamp_millis()) {
            tracing::debug!("Added past reminder to item {}; nothing to register", record.id);
            return None;
        }

        self.register(record, timestamp).await.ok()
    }

    /// Drop a reminder from the in-memory list only.
    ///
    /// The trigger itself goes away at the next `reconcile_on_edit`.
    pub fn remove_reminder(&self, record: &mut Record, timestamp: i64) -> bool {
        let before = record.reminder_timestamps.len();
        record.reminder_timestamps.retain(|&t| t != timestamp);
        before != record.reminder_timestamps.len()
    }

    /// Notification payload for one reminder
    pub fn payload_for(&self, record: &Record, timestamp: i64) -> TriggerPayload {
        let title = if record.title.trim().is_empty() {
            FALLBACK_NOTIFICATION_TITLE.to_string()
        } else {
            record.title.clone()
        };

        let body = record
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| snippet(d, self.settings.snippet_chars))
            .unwrap_or_else(|| FALLBACK_NOTIFICATION_BODY.to_string());

        TriggerPayload {
            trigger_id: TriggerId::derive(record.id, timestamp),
            record_id: record.id,
            title,
            body,
        }
    }

    async fn register(&self, record: &Record, timestamp: i64) -> Result<TriggerId> {
        let trigger = TriggerId::derive(record.id, timestamp);
        let payload = self.payload_for(record, timestamp);

        match self.alarms.register(trigger, timestamp, payload).await {
            Ok(()) => {
                tracing::debug!(
                    "Registered trigger {} at {}",
                    trigger,
                    format_millis(timestamp)
                );
                Ok(trigger)
            }
            Err(e) => {
                tracing::warn!("Could not register trigger {}: {}", trigger, e);
                Err(e)
            }
        }
    }
}

/// First `max_chars` characters, with an ellipsis when cut
fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{AlarmCall, FakeAlarms};
    use std::collections::BTreeSet;

    const NOW: i64 = 1_800_000_000_000;
    const HOUR: i64 = 3_600_000;

    fn create_test_scheduler() -> (ReminderScheduler, Arc<FakeAlarms>) {
        let alarms = Arc::new(FakeAlarms::default());
        let scheduler = ReminderScheduler::new(alarms.clone(), ReminderSettings::default());
        (scheduler, alarms)
    }

    fn record(id: i64, reminders: Vec<i64>) -> Record {
        Record {
            id,
            title: "Dentist".into(),
            description: Some("Bring the insurance card".into()),
            is_task: true,
            reminder_timestamps: reminders,
            ..Record::new_empty()
        }
    }

    fn ids(id: i64, timestamps: &[i64]) -> BTreeSet<TriggerId> {
        timestamps.iter().map(|&t| TriggerId::derive(id, t)).collect()
    }

    #[tokio::test]
    async fn test_schedule_skips_past_reminders() {
        let (scheduler, alarms) = create_test_scheduler();
        let t1 = NOW + HOUR;
        let t2 = NOW - HOUR;

        let report = scheduler.schedule_at(&record(7, vec![t1, t2]), NOW).await;

        assert_eq!(report.registered, vec![TriggerId::derive(7, t1)]);
        assert_eq!(report.skipped_past, 1);
        assert_eq!(alarms.live(), ids(7, &[t1]));
    }

    #[tokio::test]
    async fn test_skew_tolerance() {
        let (scheduler, _alarms) = create_test_scheduler();

        assert!(scheduler.is_upcoming(NOW - 500, NOW));
        assert!(!scheduler.is_upcoming(NOW - 1_000, NOW));
        assert!(!scheduler.is_upcoming(NOW - HOUR, NOW));
    }

    #[tokio::test]
    async fn test_payload_carries_navigation_data() {
        let (scheduler, alarms) = create_test_scheduler();
        let t1 = NOW + HOUR;

        scheduler.schedule_at(&record(7, vec![t1]), NOW).await;

        let payload = alarms.payload(TriggerId::derive(7, t1)).unwrap();
        assert_eq!(payload.navigation_target(), 7);
        assert_eq!(payload.title, "Dentist");
        assert_eq!(payload.body, "Bring the insurance card");
    }

    #[tokio::test]
    async fn test_payload_fallbacks_and_snippet() {
        let (scheduler, _alarms) = create_test_scheduler();
        let mut r = record(3, vec![]);
        r.title = "  ".into();
        r.description = None;

        let payload = scheduler.payload_for(&r, NOW);
        assert_eq!(payload.title, FALLBACK_NOTIFICATION_TITLE);
        assert_eq!(payload.body, FALLBACK_NOTIFICATION_BODY);

        r.description = Some("é".repeat(500));
        let payload = scheduler.payload_for(&r, NOW);
        assert_eq!(payload.body.chars().count(), 121);
        assert!(payload.body.ends_with('…'));
    }

    #[tokio::test]
    async fn test_unsaved_record_is_not_scheduled() {
        let (scheduler, alarms) = create_test_scheduler();

        let report = scheduler.schedule_at(&record(0, vec![NOW + HOUR]), NOW).await;

        assert!(report.registered.is_empty());
        assert!(alarms.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all_is_idempotent() {
        let (scheduler, alarms) = create_test_scheduler();
        let r = record(7, vec![NOW + HOUR, NOW + 2 * HOUR]);
        scheduler.schedule_at(&r, NOW).await;

        assert_eq!(scheduler.cancel_all(&r).await, 2);
        assert!(alarms.live().is_empty());

        assert_eq!(scheduler.cancel_all(&r).await, 2);
        assert!(alarms.live().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_cancels_old_then_schedules_new() {
        let (scheduler, alarms) = create_test_scheduler();
        let t1 = Utc::now().timestamp_millis() + HOUR;
        let t2 = Utc::now().timestamp_millis() - HOUR;
        let t3 = Utc::now().timestamp_millis() + 2 * HOUR;

        let old = record(7, vec![t1, t2]);
        scheduler.schedule(&old).await;
        alarms.clear_calls();

        let new = record(7, vec![t3]);
        scheduler.reconcile_on_edit(&old, &new).await;

        assert_eq!(
            alarms.calls(),
            vec![
                AlarmCall::Cancel(TriggerId::derive(7, t1)),
                AlarmCall::Cancel(TriggerId::derive(7, t2)),
                AlarmCall::Register(TriggerId::derive(7, t3)),
            ]
        );
        assert_eq!(alarms.live(), ids(7, &[t3]));
    }

    #[tokio::test]
    async fn test_reconcile_is_complete_regardless_of_old() {
        let (scheduler, alarms) = create_test_scheduler();
        let now = Utc::now().timestamp_millis();
        let future = [now + HOUR, now + 3 * HOUR];

        // Old set is unrelated to what is live
        scheduler.schedule(&record(7, vec![now + 5 * HOUR])).await;
        let old = record(7, vec![now + 5 * HOUR, now - HOUR]);
        let new = record(7, vec![future[0], now - 2 * HOUR, future[1]]);

        scheduler.reconcile_on_edit(&old, &new).await;

        assert_eq!(alarms.live(), ids(7, &future));
    }

    #[tokio::test]
    async fn test_denied_capability_does_not_stop_the_batch() {
        let (scheduler, alarms) = create_test_scheduler();
        let (a, b, c) = (NOW + HOUR, NOW + 2 * HOUR, NOW + 3 * HOUR);
        alarms.reject(b);

        let report = scheduler.schedule_at(&record(4, vec![a, b, c]), NOW).await;

        assert_eq!(report.failed, 1);
        assert_eq!(alarms.live(), ids(4, &[a, c]));
    }

    #[tokio::test]
    async fn test_add_reminder_registers_only_for_persisted_records() {
        let (scheduler, alarms) = create_test_scheduler();
        let later = Utc::now().timestamp_millis() + HOUR;

        let mut draft = record(0, vec![]);
        assert!(scheduler.add_reminder(&mut draft, later).await.is_none());
        assert_eq!(draft.reminder_timestamps, vec![later]);
        assert!(alarms.live().is_empty());

        let mut saved = record(12, vec![]);
        let trigger = scheduler.add_reminder(&mut saved, later).await;
        assert_eq!(trigger, Some(TriggerId::derive(12, later)));
        assert_eq!(alarms.live(), ids(12, &[later]));
    }

    #[tokio::test]
    async fn test_remove_reminder_is_in_memory_only() {
        let (scheduler, alarms) = create_test_scheduler();
        let later = Utc::now().timestamp_millis() + HOUR;
        let mut saved = record(12, vec![]);
        scheduler.add_reminder(&mut saved, later).await;
        alarms.clear_calls();

        assert!(scheduler.remove_reminder(&mut saved, later));
        assert!(!scheduler.remove_reminder(&mut saved, later));
        assert!(saved.reminder_timestamps.is_empty());
        assert!(alarms.calls().is_empty());
        assert_eq!(alarms.live(), ids(12, &[later]));
    }
}
