//! Items service
//!
//! High-level business logic for notes and tasks.
//! Coordinates the repository, the reminder scheduler and the attachment
//! store so that a save or delete touches all three in a fixed order.

use crate::database::{ItemChange, Record, Repository};
use crate::error::Result;
use crate::services::attachments::AttachmentStore;
use crate::services::reminders::ReminderScheduler;
use crate::services::session::{EditSession, SessionParts};
use crate::storage::Locator;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Service for managing notes and tasks
#[derive(Clone)]
pub struct ItemService {
    repo: Repository,
    reminders: ReminderScheduler,
    attachments: AttachmentStore,
}

impl ItemService {
    pub fn new(repo: Repository, reminders: ReminderScheduler, attachments: AttachmentStore) -> Self {
        Self {
            repo,
            reminders,
            attachments,
        }
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Start editing a blank item
    pub fn new_session(&self) -> EditSession {
        EditSession::new_item()
    }

    /// Start editing a stored item
    pub async fn open_session(&self, id: i64) -> Result<EditSession> {
        let record = self.repo.require_item(id).await?;
        Ok(EditSession::open(record))
    }

    /// Persist an edit session and bring its triggers in line.
    ///
    /// New items are inserted and then scheduled. For existing items every
    /// trigger the stored version or the session may have registered is
    /// cancelled and the new list scheduled before the row is updated.
    /// Attachments deleted in the session are released once the row is
    /// written.
    pub async fn save(&self, session: EditSession) -> Result<Record> {
        let SessionParts {
            draft: mut record,
            registered_while_editing,
            pending_captures,
            pending_releases,
        } = session.into_parts();

        for file in pending_captures {
            self.attachments.discard(file).await;
        }

        normalize(&mut record);

        if !record.is_persisted() {
            tracing::info!("Creating new item: {}", record.title);

            record.id = self.repo.insert_item(&record).await?;
            self.reminders.schedule(&record).await;
            self.release_detached(&record, pending_releases).await;

            tracing::info!("Item created successfully: {}", record.id);
            return Ok(record);
        }

        tracing::debug!("Updating item: {}", record.id);

        let mut previous = self.repo.require_item(record.id).await?;
        previous
            .reminder_timestamps
            .extend(registered_while_editing);

        self.reminders.reconcile_on_edit(&previous, &record).await;
        self.repo.update_item(&record).await?;
        self.release_detached(&record, pending_releases).await;

        tracing::debug!("Item updated successfully: {}", record.id);
        Ok(record)
    }

    /// Run `save` on its own task
    pub fn spawn_save(&self, session: EditSession) -> JoinHandle<Result<Record>> {
        let service = self.clone();
        tokio::spawn(async move { service.save(session).await })
    }

    /// Delete an item: triggers first, then attachments, then the row.
    ///
    /// Grants on files another item still lists are kept.
    pub async fn delete(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting item: {}", id);

        let record = self.repo.require_item(id).await?;
        let shared = self.shared_files(&record).await?;

        let mut releasable = record.clone();
        releasable.file_paths.retain(|uri| !shared.contains(uri));

        self.reminders.cancel_all(&record).await;
        self.attachments.delete_all(&releasable).await;
        self.repo.delete_item(&record).await?;

        tracing::info!("Item deleted successfully: {}", id);
        Ok(())
    }

    /// Delete one attachment of a stored item and persist the shortened
    /// list right away
    pub async fn delete_attachment(&self, id: i64, locator: &Locator) -> Result<Record> {
        let mut record = self.repo.require_item(id).await?;
        if !record.references(locator) {
            tracing::debug!("Item {} does not list {}", id, locator);
            return Ok(record);
        }

        if self.is_shared(locator, id).await? {
            self.attachments.detach(&mut record, locator);
        } else {
            self.attachments.delete(&mut record, locator).await;
        }
        self.repo.update_item(&record).await?;

        Ok(record)
    }

    /// Cancel one reminder and persist the shortened list right away
    pub async fn cancel_reminder(&self, id: i64, timestamp: i64) -> Result<Record> {
        let mut record = self.repo.require_item(id).await?;

        // A failed cancel leaves at most a stale trigger, which fires for a
        // timestamp no longer listed
        let _ = self.reminders.cancel_one(id, timestamp).await;
        record.reminder_timestamps.retain(|&t| t != timestamp);
        self.repo.update_item(&record).await?;

        tracing::info!("Cancelled reminder {} of item {}", timestamp, id);
        Ok(record)
    }

    /// Flip completion of a task. Notes are returned unchanged.
    pub async fn toggle_completion(&self, id: i64) -> Result<Record> {
        let mut record = self.repo.require_item(id).await?;

        if !record.is_task {
            tracing::debug!("Item {} is a note; completion not toggled", id);
            return Ok(record);
        }

        record.is_completed = !record.is_completed;
        self.repo.update_item(&record).await?;

        tracing::debug!("Item {} completed: {}", id, record.is_completed);
        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Record>> {
        self.repo.get_item(id).await
    }

    pub async fn list_notes(&self) -> Result<Vec<Record>> {
        self.repo.list_notes().await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Record>> {
        self.repo.list_tasks().await
    }

    pub async fn list_all(&self) -> Result<Vec<Record>> {
        self.repo.list_all().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ItemChange> {
        self.repo.subscribe()
    }

    /// Release attachments a saved session removed, unless the saved record
    /// or another item still lists them
    async fn release_detached(&self, record: &Record, locators: Vec<Locator>) {
        for locator in locators {
            if record.references(&locator) {
                continue;
            }

            match self.is_shared(&locator, record.id).await {
                Ok(true) => {
                    tracing::debug!("Keeping {}: listed by another item", locator);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Keeping {}: could not check other items: {}", locator, e);
                    continue;
                }
            }

            if let Err(e) = self.attachments.release(&locator).await {
                tracing::warn!("Failed to release attachment {}: {}", locator, e);
            }
        }
    }

    /// Whether an external file is also listed by an item other than `id`
    async fn is_shared(&self, locator: &Locator, id: i64) -> Result<bool> {
        match locator {
            Locator::External(uri) => self.repo.file_referenced_elsewhere(uri.as_str(), id).await,
            Locator::Internal { .. } => Ok(false),
        }
    }

    async fn shared_files(&self, record: &Record) -> Result<HashSet<String>> {
        let mut shared = HashSet::new();
        for uri in &record.file_paths {
            if self.repo.file_referenced_elsewhere(uri, record.id).await? {
                shared.insert(uri.clone());
            }
        }
        Ok(shared)
    }
}

/// Trim text fields; a blank description is stored as none
fn normalize(record: &mut Record) {
    record.title = record.title.trim().to_string();

    record.description = record
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
}
