//! Database models
//!
//! Rust structs representing database entities.
//! Path and reminder lists are stored as JSON text columns and decoded
//! into typed vectors at the repository boundary.

use crate::error::{AppError, Result};
use crate::storage::{ExternalUri, Locator, MediaKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A note or task as the rest of the application sees it.
///
/// `id == 0` means the record has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_task: bool,
    /// Only meaningful when `is_task` is true.
    pub is_completed: bool,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Reminder times in epoch milliseconds, in insertion order
    pub reminder_timestamps: Vec<i64>,
    pub photo_paths: Vec<String>,
    pub video_paths: Vec<String>,
    pub audio_paths: Vec<String>,
    /// External URI strings for user-picked files
    pub file_paths: Vec<String>,
}

/// Whether a record is a plain note or a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Note,
    Task,
}

impl Record {
    /// A blank, unsaved record as produced by the "new item" action.
    pub fn new_empty() -> Self {
        Self {
            id: 0,
            title: String::new(),
            description: None,
            is_task: false,
            is_completed: false,
            timestamp: Utc::now().timestamp_millis(),
            reminder_timestamps: Vec::new(),
            photo_paths: Vec::new(),
            video_paths: Vec::new(),
            audio_paths: Vec::new(),
            file_paths: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn kind(&self) -> ItemKind {
        if self.is_task {
            ItemKind::Task
        } else {
            ItemKind::Note
        }
    }

    pub fn media_paths(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Photo => &self.photo_paths,
            MediaKind::Video => &self.video_paths,
            MediaKind::Audio => &self.audio_paths,
        }
    }

    pub fn media_paths_mut(&mut self, kind: MediaKind) -> &mut Vec<String> {
        match kind {
            MediaKind::Photo => &mut self.photo_paths,
            MediaKind::Video => &mut self.video_paths,
            MediaKind::Audio => &mut self.audio_paths,
        }
    }

    /// Every attachment of the record, classified by the list it lives in.
    ///
    /// File-list entries that fail to parse as URIs are logged and skipped.
    pub fn locators(&self) -> Vec<Locator> {
        let mut locators = Vec::with_capacity(
            self.photo_paths.len()
                + self.video_paths.len()
                + self.audio_paths.len()
                + self.file_paths.len(),
        );

        for kind in MediaKind::ALL {
            for path in self.media_paths(kind) {
                locators.push(Locator::Internal {
                    kind,
                    path: path.clone(),
                });
            }
        }

        for raw in &self.file_paths {
            match ExternalUri::parse(raw) {
                Ok(uri) => locators.push(Locator::External(uri)),
                Err(e) => tracing::warn!("Skipping file entry of item {}: {}", self.id, e),
            }
        }

        locators
    }

    /// True if the locator is currently referenced by one of the lists.
    pub fn references(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Internal { kind, path } => self.media_paths(*kind).contains(path),
            Locator::External(uri) => self.file_paths.iter().any(|p| p == uri.as_str()),
        }
    }
}

/// Raw `items` row; list columns hold JSON text.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ItemRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_task: bool,
    pub is_completed: bool,
    pub timestamp: i64,
    pub reminder_timestamps: String,
    pub photo_paths: String,
    pub video_paths: String,
    pub audio_paths: String,
    pub file_paths: String,
}

impl TryFrom<ItemRow> for Record {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            is_task: row.is_task,
            is_completed: row.is_completed,
            timestamp: row.timestamp,
            reminder_timestamps: serde_json::from_str(&row.reminder_timestamps)?,
            photo_paths: serde_json::from_str(&row.photo_paths)?,
            video_paths: serde_json::from_str(&row.video_paths)?,
            audio_paths: serde_json::from_str(&row.audio_paths)?,
            file_paths: serde_json::from_str(&row.file_paths)?,
        })
    }
}

/// What happened to an item, as broadcast by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// Change notification for subscribers of the item store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemChange {
    pub change: ChangeKind,
    pub id: i64,
    pub kind: ItemKind,
}

/// Durable read grant on an externally owned resource
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessGrant {
    pub uri: String,
    /// Epoch milliseconds
    pub granted_at: i64,
}
