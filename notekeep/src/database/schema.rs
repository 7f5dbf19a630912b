//! Database schema and migrations
//!
//! This module handles database initialization and schema migrations.
//! Uses SQLite with WAL mode for better concurrency and crash safety.
//!
//! Every version bump is forward-only: new columns arrive with safe
//! defaults, and shape changes translate old values (a single due date
//! becomes a one-element reminder list in version 3).

use crate::error::{AppError, Result};
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    migrate_to(pool, latest_version()).await?;
    tracing::info!("Database initialization complete");
    Ok(())
}

/// Apply pending migrations up to and including `target`.
///
/// Exposed separately so an older schema can be materialised and then
/// upgraded.
pub async fn migrate_to(pool: &SqlitePool, target: i32) -> Result<()> {
    if target > latest_version() {
        return Err(AppError::Generic(format!(
            "Unknown schema version {} (latest is {})",
            target,
            latest_version()
        )));
    }

    // Enable WAL mode for better performance and crash safety
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current = current_version(pool).await?;
    tracing::info!("Current database version: {}", current);

    apply_migrations(pool, current, target).await
}

/// Highest version recorded in the migrations table
pub async fn current_version(pool: &SqlitePool) -> Result<i32> {
    let version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);
    Ok(version)
}

/// Latest schema version known by this binary
pub fn latest_version() -> i32 {
    get_migrations().last().map_or(0, |(version, _)| *version)
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32, target: i32) -> Result<()> {
    for (version, sql) in get_migrations() {
        if version <= current_version || version > target {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        let mut tx = pool.begin().await?;

        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(())
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![
        (1, include_str!("migrations/001_initial_schema.sql")),
        (2, include_str!("migrations/002_due_date_and_media.sql")),
        (3, include_str!("migrations/003_reminder_list.sql")),
        (4, include_str!("migrations/004_access_grants.sql")),
    ]
}
