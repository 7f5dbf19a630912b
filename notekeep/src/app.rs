//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::{DATABASE_FILE_NAME, MEDIA_DIR_NAME};
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    AppSettings, AttachmentStore, BootReconciler, ItemService, JobSchedulerAlarms,
    NotificationPort, PersistedGrants, ReminderScheduler, SettingsService,
};
use crate::storage::MediaStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings: AppSettings,
    pub settings_service: SettingsService,
    pub repo: Repository,
    pub alarms: JobSchedulerAlarms,
    pub items: ItemService,
    pub boot: BootReconciler,
}

impl AppState {
    /// Open every store under `app_data_dir` and start the alarm scheduler.
    pub async fn initialize(
        app_data_dir: &Path,
        notifier: Arc<dyn NotificationPort>,
    ) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        // Create necessary directories
        tokio::fs::create_dir_all(app_data_dir).await?;

        let settings_service = SettingsService::new(app_data_dir.to_path_buf());
        let settings = settings_service.load().await?;

        let pool = create_pool(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
        let repo = Repository::new(pool);

        let media = MediaStore::new(app_data_dir.join(MEDIA_DIR_NAME));
        media.initialize().await?;

        let alarms = JobSchedulerAlarms::new(notifier).await?;
        alarms.set_exact_alarms_allowed(settings.reminders.exact_alarms_enabled);
        alarms.start().await?;

        let grants = Arc::new(PersistedGrants::new(repo.clone()));
        let attachments = AttachmentStore::new(media, grants);
        let reminders =
            ReminderScheduler::new(Arc::new(alarms.clone()), settings.reminders.clone());

        let items = ItemService::new(repo.clone(), reminders.clone(), attachments.clone());
        let boot = BootReconciler::new(repo.clone(), reminders, attachments);

        tracing::info!("Application initialized successfully");

        Ok(Self {
            app_data_dir: app_data_dir.to_path_buf(),
            settings,
            settings_service,
            repo,
            alarms,
            items,
            boot,
        })
    }

    /// Stop the alarm scheduler and close the database
    pub async fn shutdown(&self) -> Result<()> {
        self.alarms.shutdown().await?;
        self.repo.close().await;
        tracing::info!("Application shut down");
        Ok(())
    }
}
