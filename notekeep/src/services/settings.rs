//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_SKEW_TOLERANCE_MS, DEFAULT_SNIPPET_CHARS, MAX_SKEW_TOLERANCE_MS, MAX_SNIPPET_CHARS,
    MIN_SNIPPET_CHARS, SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Reminder scheduling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// Reminders at most this far in the past are still registered
    #[serde(default = "default_skew_tolerance")]
    pub skew_tolerance_ms: i64,
    /// Description characters carried in the notification body
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Mirrors the platform's exact-alarm permission
    #[serde(default = "default_true")]
    pub exact_alarms_enabled: bool,
}

fn default_skew_tolerance() -> i64 {
    DEFAULT_SKEW_TOLERANCE_MS
}

fn default_snippet_chars() -> usize {
    DEFAULT_SNIPPET_CHARS
}

fn default_true() -> bool {
    true
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            skew_tolerance_ms: default_skew_tolerance(),
            snippet_chars: default_snippet_chars(),
            exact_alarms_enabled: true,
        }
    }
}

impl ReminderSettings {
    /// Clamp values into the ranges declared in `config`
    pub fn validated(mut self) -> Self {
        self.skew_tolerance_ms = self.skew_tolerance_ms.clamp(0, MAX_SKEW_TOLERANCE_MS);
        self.snippet_chars = self.snippet_chars.clamp(MIN_SNIPPET_CHARS, MAX_SNIPPET_CHARS);
        self
    }
}

/// Attachment housekeeping settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSettings {
    /// Minimum age before an unreferenced media file may be swept.
    /// Unset means the sweep only runs when asked with an explicit age.
    #[serde(default)]
    pub sweep_min_age_hours: Option<u64>,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppSettings {
    #[serde(default)]
    pub reminders: ReminderSettings,
    #[serde(default)]
    pub attachments: AttachmentSettings,
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !fs::try_exists(&self.settings_path).await? {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let mut settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("Failed to parse settings: {}", e)))?;

        settings.reminders = settings.reminders.validated();

        Ok(settings)
    }

    /// Save settings to disk, writing a temp file first
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.settings_path.with_extension("tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.settings_path).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Get reminder settings
    pub async fn get_reminders(&self) -> Result<ReminderSettings> {
        let settings = self.load().await?;
        Ok(settings.reminders)
    }

    /// Update reminder settings
    pub async fn update_reminders(&self, reminders: ReminderSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.reminders = reminders.validated();
        self.save(&settings).await?;
        Ok(())
    }

    /// Get attachment settings
    pub async fn get_attachments(&self) -> Result<AttachmentSettings> {
        let settings = self.load().await?;
        Ok(settings.attachments)
    }

    /// Update attachment settings
    pub async fn update_attachments(&self, attachments: AttachmentSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.attachments = attachments;
        self.save(&settings).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::new(temp_dir.path().to_path_buf());
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_default_settings_created_on_load() {
        let (service, temp) = create_test_service();

        let settings = service.load().await.unwrap();

        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.reminders.skew_tolerance_ms, 1_000);
        assert!(settings.reminders.exact_alarms_enabled);
        assert_eq!(settings.attachments.sweep_min_age_hours, None);
        assert!(temp.path().join(SETTINGS_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_missing_fields_take_defaults() {
        let (service, temp) = create_test_service();
        std::fs::write(
            temp.path().join(SETTINGS_FILE_NAME),
            r#"{"reminders":{"snippet_chars":40}}"#,
        )
        .unwrap();

        let settings = service.load().await.unwrap();
        assert_eq!(settings.reminders.snippet_chars, 40);
        assert_eq!(settings.reminders.skew_tolerance_ms, DEFAULT_SKEW_TOLERANCE_MS);
        assert!(settings.reminders.exact_alarms_enabled);
    }

    #[tokio::test]
    async fn test_out_of_range_values_are_clamped() {
        let (service, _temp) = create_test_service();

        service
            .update_reminders(ReminderSettings {
                skew_tolerance_ms: 60_000,
                snippet_chars: 1,
                exact_alarms_enabled: false,
            })
            .await
            .unwrap();

        let loaded = service.get_reminders().await.unwrap();
        assert_eq!(loaded.skew_tolerance_ms, MAX_SKEW_TOLERANCE_MS);
        assert_eq!(loaded.snippet_chars, MIN_SNIPPET_CHARS);
        assert!(!loaded.exact_alarms_enabled);
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let service = SettingsService::new(temp_dir.path().to_path_buf());
            service
                .update_attachments(AttachmentSettings {
                    sweep_min_age_hours: Some(48),
                })
                .await
                .unwrap();
        }

        let service = SettingsService::new(temp_dir.path().to_path_buf());
        let loaded = service.get_attachments().await.unwrap();
        assert_eq!(loaded.sweep_min_age_hours, Some(48));
    }

    #[tokio::test]
    async fn test_corrupt_settings_file() {
        let (service, temp) = create_test_service();
        std::fs::write(temp.path().join(SETTINGS_FILE_NAME), "{not json").unwrap();

        assert!(matches!(service.load().await, Err(AppError::Settings(_))));
    }
}
