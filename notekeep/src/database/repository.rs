//! Repository layer for database operations
//!
//! Durable item storage keyed by integer id, the access-grant table,
//! and a broadcast stream of item changes.

use super::models::*;
use crate::config::CHANGE_CHANNEL_CAPACITY;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

const ITEM_COLUMNS: &str = "id, title, description, is_task, is_completed, timestamp, \
     reminder_timestamps, photo_paths, video_paths, audio_paths, file_paths";

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    changes: broadcast::Sender<ItemChange>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { pool, changes }
    }

    /// Subscribe to item inserts, updates and deletes.
    ///
    /// Filter on `ItemChange::kind` to follow only notes or only tasks.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemChange> {
        self.changes.subscribe()
    }

    fn publish(&self, change: ChangeKind, id: i64, kind: ItemKind) {
        // No subscribers is not an error
        let _ = self.changes.send(ItemChange { change, id, kind });
    }

    /// Get an item by id
    pub async fn get_item(&self, id: i64) -> Result<Option<Record>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = ?",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Record::try_from).transpose()
    }

    /// Get an item by id, failing if it does not exist
    pub async fn require_item(&self, id: i64) -> Result<Record> {
        self.get_item(id)
            .await?
            .ok_or(AppError::ItemNotFound(id))
    }

    /// Insert a record and return the id assigned by the store.
    ///
    /// The record's own `id` is ignored unless it is already positive.
    pub async fn insert_item(&self, record: &Record) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO items (id, title, description, is_task, is_completed, timestamp,
                               reminder_timestamps, photo_paths, video_paths, audio_paths, file_paths)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(if record.is_persisted() { Some(record.id) } else { None })
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.is_task)
        .bind(record.is_completed)
        .bind(record.timestamp)
        .bind(serde_json::to_string(&record.reminder_timestamps)?)
        .bind(serde_json::to_string(&record.photo_paths)?)
        .bind(serde_json::to_string(&record.video_paths)?)
        .bind(serde_json::to_string(&record.audio_paths)?)
        .bind(serde_json::to_string(&record.file_paths)?)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Inserted item: {}", id);
        self.publish(ChangeKind::Inserted, id, record.kind());
        Ok(id)
    }

    /// Overwrite every column of an existing item
    pub async fn update_item(&self, record: &Record) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE items SET title = ?, description = ?, is_task = ?, is_completed = ?,
                reminder_timestamps = ?, photo_paths = ?, video_paths = ?, audio_paths = ?,
                file_paths = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.is_task)
        .bind(record.is_completed)
        .bind(serde_json::to_string(&record.reminder_timestamps)?)
        .bind(serde_json::to_string(&record.photo_paths)?)
        .bind(serde_json::to_string(&record.video_paths)?)
        .bind(serde_json::to_string(&record.audio_paths)?)
        .bind(serde_json::to_string(&record.file_paths)?)
        .bind(record.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::ItemNotFound(record.id));
        }

        tracing::debug!("Updated item: {}", record.id);
        self.publish(ChangeKind::Updated, record.id, record.kind());
        Ok(())
    }

    /// Permanently delete an item row
    pub async fn delete_item(&self, record: &Record) -> Result<()> {
        let rows = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(record.id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ItemNotFound(record.id));
        }

        tracing::debug!("Deleted item: {}", record.id);
        self.publish(ChangeKind::Deleted, record.id, record.kind());
        Ok(())
    }

    /// List notes, newest first
    pub async fn list_notes(&self) -> Result<Vec<Record>> {
        self.fetch_items(&format!(
            "SELECT {} FROM items WHERE is_task = 0 ORDER BY timestamp DESC",
            ITEM_COLUMNS
        ))
        .await
    }

    /// List tasks, open ones first, then newest first
    pub async fn list_tasks(&self) -> Result<Vec<Record>> {
        self.fetch_items(&format!(
            "SELECT {} FROM items WHERE is_task = 1 ORDER BY is_completed ASC, timestamp DESC",
            ITEM_COLUMNS
        ))
        .await
    }

    /// List every item regardless of kind
    pub async fn list_all(&self) -> Result<Vec<Record>> {
        self.fetch_items(&format!("SELECT {} FROM items ORDER BY id ASC", ITEM_COLUMNS))
            .await
    }

    /// Rows whose list columns fail to decode are logged and skipped
    async fn fetch_items(&self, sql: &str) -> Result<Vec<Record>> {
        let rows = sqlx::query_as::<_, ItemRow>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                Record::try_from(row)
                    .map_err(|e| tracing::warn!("Skipping unreadable item {}: {}", id, e))
                    .ok()
            })
            .collect())
    }

    /// Whether any item other than `except_id` lists `uri` as a file
    pub async fn file_referenced_elsewhere(&self, uri: &str, except_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM items, json_each(items.file_paths)
            WHERE items.id != ? AND json_each.value = ?
            "#,
        )
        .bind(except_id)
        .bind(uri)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Record a durable access grant. Re-granting refreshes the timestamp.
    pub async fn insert_grant(&self, uri: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_grants (uri, granted_at) VALUES (?, ?)
            ON CONFLICT(uri) DO UPDATE SET granted_at = excluded.granted_at
            "#,
        )
        .bind(uri)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored access grant: {}", uri);
        Ok(())
    }

    /// Remove a grant, returning whether one existed
    pub async fn delete_grant(&self, uri: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM access_grants WHERE uri = ?")
            .bind(uri)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn has_grant(&self, uri: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_grants WHERE uri = ?")
            .bind(uri)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    pub async fn list_grants(&self) -> Result<Vec<AccessGrant>> {
        let grants = sqlx::query_as::<_, AccessGrant>(
            "SELECT uri, granted_at FROM access_grants ORDER BY granted_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    fn task(title: &str) -> Record {
        Record {
            title: title.to_string(),
            is_task: true,
            ..Record::new_empty()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_round_trips() {
        let repo = create_test_repo().await;

        let mut record = task("Call the plumber");
        record.reminder_timestamps = vec![1_900_000_000_000, 1_900_000_060_000];
        record.photo_paths = vec!["images/img_1.jpg".into()];
        record.file_paths = vec!["file:///home/me/quote.pdf".into()];

        let id = repo.insert_item(&record).await.unwrap();
        assert!(id > 0);

        let fetched = repo.require_item(id).await.unwrap();
        record.id = id;
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_get_missing_item() {
        let repo = create_test_repo().await;

        assert!(repo.get_item(42).await.unwrap().is_none());
        assert!(matches!(
            repo.require_item(42).await,
            Err(AppError::ItemNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = create_test_repo().await;

        let id = repo.insert_item(&task("Original")).await.unwrap();
        let mut record = repo.require_item(id).await.unwrap();

        record.title = "Updated".into();
        record.reminder_timestamps.push(5);
        repo.update_item(&record).await.unwrap();

        let fetched = repo.require_item(id).await.unwrap();
        assert_eq!(fetched.title, "Updated");
        assert_eq!(fetched.reminder_timestamps, vec![5]);

        repo.delete_item(&record).await.unwrap();
        assert!(repo.get_item(id).await.unwrap().is_none());
        assert!(repo.delete_item(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_lists_filter_by_kind() {
        let repo = create_test_repo().await;

        let mut done = task("Done");
        done.is_completed = true;
        done.timestamp = 3;
        let mut open = task("Open");
        open.timestamp = 1;
        let note = Record {
            title: "Note".into(),
            ..Record::new_empty()
        };

        repo.insert_item(&done).await.unwrap();
        repo.insert_item(&open).await.unwrap();
        repo.insert_item(&note).await.unwrap();

        let tasks = repo.list_tasks().await.unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Open", "Done"]);

        let notes = repo.list_notes().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Note");

        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_change_notifications() {
        let repo = create_test_repo().await;
        let mut changes = repo.subscribe();

        let id = repo.insert_item(&task("Watch me")).await.unwrap();
        let record = repo.require_item(id).await.unwrap();
        repo.update_item(&record).await.unwrap();
        repo.delete_item(&record).await.unwrap();

        let kinds: Vec<ChangeKind> = vec![
            changes.recv().await.unwrap().change,
            changes.recv().await.unwrap().change,
            changes.recv().await.unwrap().change,
        ];
        assert_eq!(
            kinds,
            vec![ChangeKind::Inserted, ChangeKind::Updated, ChangeKind::Deleted]
        );
    }

    #[tokio::test]
    async fn test_grants() {
        let repo = create_test_repo().await;

        repo.insert_grant("content://docs/1").await.unwrap();
        repo.insert_grant("content://docs/1").await.unwrap();
        assert!(repo.has_grant("content://docs/1").await.unwrap());
        assert_eq!(repo.list_grants().await.unwrap().len(), 1);

        assert!(repo.delete_grant("content://docs/1").await.unwrap());
        assert!(!repo.delete_grant("content://docs/1").await.unwrap());
        assert!(!repo.has_grant("content://docs/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_row_does_not_hide_the_rest() {
        let repo = create_test_repo().await;
        let good = repo.insert_item(&task("Readable")).await.unwrap();

        sqlx::query(
            "INSERT INTO items (title, is_task, is_completed, timestamp, reminder_timestamps) \
             VALUES ('Broken', 1, 0, 2, 'not json')",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, good);
        assert_eq!(repo.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_referenced_elsewhere() {
        let repo = create_test_repo().await;

        let mut first = task("First");
        first.file_paths = vec!["content://docs/shared".into()];
        let first_id = repo.insert_item(&first).await.unwrap();

        let mut second = task("Second");
        second.file_paths = vec!["content://docs/shared".into(), "content://docs/own".into()];
        let second_id = repo.insert_item(&second).await.unwrap();

        assert!(repo
            .file_referenced_elsewhere("content://docs/shared", first_id)
            .await
            .unwrap());
        assert!(!repo
            .file_referenced_elsewhere("content://docs/own", second_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_closed_pool_surfaces_database_error() {
        let repo = create_test_repo().await;
        repo.close().await;

        let err = repo.list_all().await.unwrap_err();
        assert!(err.is_store_unavailable());
    }
}
