//! Services module
//!
//! Business logic that coordinates the repository, the media store and
//! the alarm, notification and grant ports.

pub mod alarms;
pub mod attachments;
pub mod boot;
pub mod grants;
pub mod items;
pub mod notifications;
pub mod reminders;
pub mod session;
pub mod settings;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use alarms::{AlarmPort, JobSchedulerAlarms};
pub use attachments::{AttachmentStore, CleanupReport, ResolvedAttachment};
pub use boot::{BootReconciler, BootReport};
pub use grants::{GrantPort, PersistedGrants};
pub use items::ItemService;
pub use notifications::{ChannelNotifier, LogNotifier, NotificationPort};
pub use reminders::{ReminderScheduler, ScheduleReport};
pub use session::EditSession;
pub use settings::{AppSettings, AttachmentSettings, ReminderSettings, SettingsService};
pub use trigger::{TriggerId, TriggerPayload};
