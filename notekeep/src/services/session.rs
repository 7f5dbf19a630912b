//! Edit session
//!
//! Form state for one record between opening it and saving it. The session
//! owns the draft record, at most one in-flight capture per media kind,
//! and the attachment currently shown in the viewer.

use crate::database::Record;
use crate::error::Result;
use crate::services::attachments::AttachmentStore;
use crate::services::reminders::ReminderScheduler;
use crate::storage::{Locator, MediaFile, MediaKind};
use std::collections::HashMap;
use std::path::PathBuf;

/// What `save` needs from a finished session
pub(crate) struct SessionParts {
    pub draft: Record,
    /// Reminders whose triggers were registered before the save
    pub registered_while_editing: Vec<i64>,
    /// Captures that never finished
    pub pending_captures: Vec<MediaFile>,
    /// Attachments removed from the draft, released once the save lands
    pub pending_releases: Vec<Locator>,
}

#[derive(Debug)]
pub struct EditSession {
    draft: Record,
    captures: HashMap<MediaKind, MediaFile>,
    viewing: Option<Locator>,
    registered_while_editing: Vec<i64>,
    pending_releases: Vec<Locator>,
}

impl EditSession {
    /// Session for a blank, unsaved record
    pub fn new_item() -> Self {
        Self::open(Record::new_empty())
    }

    /// Session over an already loaded record
    pub fn open(record: Record) -> Self {
        Self {
            draft: record,
            captures: HashMap::new(),
            viewing: None,
            registered_while_editing: Vec::new(),
            pending_releases: Vec::new(),
        }
    }

    pub fn draft(&self) -> &Record {
        &self.draft
    }

    pub fn record_id(&self) -> i64 {
        self.draft.id
    }

    pub fn is_new(&self) -> bool {
        !self.draft.is_persisted()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.draft.description = description;
    }

    pub fn set_task(&mut self, is_task: bool) {
        self.draft.is_task = is_task;
    }

    pub fn set_completed(&mut self, is_completed: bool) {
        self.draft.is_completed = is_completed;
    }

    /// Reminder times in display order
    pub fn reminders(&self) -> Vec<i64> {
        let mut sorted = self.draft.reminder_timestamps.clone();
        sorted.sort_unstable();
        sorted
    }

    pub async fn add_reminder(&mut self, scheduler: &ReminderScheduler, timestamp: i64) {
        if scheduler.add_reminder(&mut self.draft, timestamp).await.is_some() {
            self.registered_while_editing.push(timestamp);
        }
    }

    pub fn remove_reminder(&mut self, scheduler: &ReminderScheduler, timestamp: i64) -> bool {
        scheduler.remove_reminder(&mut self.draft, timestamp)
    }

    /// Stage a capture and return the path the capture activity writes to.
    ///
    /// A capture of the same kind still in flight is discarded first.
    pub async fn begin_capture(
        &mut self,
        store: &AttachmentStore,
        kind: MediaKind,
    ) -> Result<PathBuf> {
        if let Some(previous) = self.captures.remove(&kind) {
            tracing::debug!("Replacing unfinished {:?} capture", kind);
            store.discard(previous).await;
        }

        let file = store.stage_capture(kind).await?;
        let handle = file.handle().to_path_buf();
        self.captures.insert(kind, file);
        Ok(handle)
    }

    /// Complete the in-flight capture of `kind`
    pub async fn finish_capture(
        &mut self,
        store: &AttachmentStore,
        kind: MediaKind,
        success: bool,
    ) -> Option<Locator> {
        match self.captures.remove(&kind) {
            Some(file) => store.commit_capture(&mut self.draft, file, success).await,
            None => {
                tracing::warn!("No {:?} capture in flight", kind);
                None
            }
        }
    }

    /// Drop every unfinished capture
    pub async fn abandon_captures(&mut self, store: &AttachmentStore) {
        for (_, file) in self.captures.drain() {
            store.discard(file).await;
        }
    }

    pub fn has_capture_in_flight(&self, kind: MediaKind) -> bool {
        self.captures.contains_key(&kind)
    }

    pub async fn attach_file(&mut self, store: &AttachmentStore, raw: &str) -> Result<Locator> {
        store.stage_external_file(&mut self.draft, raw).await
    }

    /// Remove an attachment from the draft; the viewer closes if it was
    /// showing it. The bytes or grant are released by `save`, so an
    /// abandoned session never leaves the stored record dangling.
    pub fn delete_attachment(&mut self, store: &AttachmentStore, locator: &Locator) -> bool {
        let removed = store.detach(&mut self.draft, locator);
        if removed && !self.pending_releases.contains(locator) {
            self.pending_releases.push(locator.clone());
        }
        if self.viewing.as_ref() == Some(locator) {
            self.viewing = None;
        }
        removed
    }

    /// Show an attachment of the draft. Returns `false` if the draft does
    /// not reference it.
    pub fn open_viewer(&mut self, locator: Locator) -> bool {
        if !self.draft.references(&locator) {
            return false;
        }
        self.viewing = Some(locator);
        true
    }

    pub fn close_viewer(&mut self) {
        self.viewing = None;
    }

    pub fn viewing(&self) -> Option<&Locator> {
        self.viewing.as_ref()
    }

    /// Reset the form to a blank new item
    pub async fn clear(&mut self, store: &AttachmentStore) {
        self.abandon_captures(store).await;
        *self = Self::new_item();
    }

    pub(crate) fn into_parts(self) -> SessionParts {
        SessionParts {
            draft: self.draft,
            registered_while_editing: self.registered_while_editing,
            pending_captures: self.captures.into_values().collect(),
            pending_releases: self.pending_releases,
        }
    }
}
