//! Application configuration constants
//!
//! Central location for configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Reminder Scheduling =====

/// Default tolerance, in milliseconds, for reminders that are a hair in
/// the past by the time they reach the scheduler.
pub const DEFAULT_SKEW_TOLERANCE_MS: i64 = 1_000;

/// Maximum accepted skew tolerance. Anything larger would re-fire
/// reminders the user already saw.
pub const MAX_SKEW_TOLERANCE_MS: i64 = 1_000;

/// Default number of description characters carried in a notification.
pub const DEFAULT_SNIPPET_CHARS: usize = 120;

/// Smallest description snippet worth showing.
pub const MIN_SNIPPET_CHARS: usize = 16;

/// Largest description snippet a notification body can carry.
pub const MAX_SNIPPET_CHARS: usize = 1_000;

/// Title used when a record has an empty title.
pub const FALLBACK_NOTIFICATION_TITLE: &str = "Task reminder";

/// Body used when a record has no description.
pub const FALLBACK_NOTIFICATION_BODY: &str = "You have a pending task";

// ===== Attachments =====

/// Directory under the data directory holding captured media.
pub const MEDIA_DIR_NAME: &str = "media";

/// URI schemes for which a durable read grant can be taken.
pub const GRANTABLE_SCHEMES: &[&str] = &["file", "content"];

// ===== Persistence =====

/// File name of the SQLite database inside the data directory.
pub const DATABASE_FILE_NAME: &str = "notekeep.db";

/// File name of the JSON settings file inside the data directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Capacity of the item change broadcast channel.
/// Slow subscribers past this lag and must reload.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;
