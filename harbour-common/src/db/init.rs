//! Database initialization
//!
//! Creates the database file and the identity table on first run. Table
//! creation is idempotent, so every start runs the same statements.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Time a writer waits for the database lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Applied to every pooled connection, not just the first
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_users_table(&pool).await?;

    Ok(pool)
}

/// Open a single-connection in-memory database with the schema applied
///
/// One connection only: every pooled connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    create_users_table(&pool).await?;

    Ok(pool)
}

/// Create the users table
///
/// One row per internal user id. Legacy fields and the alt-system email
/// default to empty strings; a cookie is only valid alongside its mirror.
/// `revision` counts updates after the first insert.
pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            internal_user_id INTEGER NOT NULL UNIQUE,
            classic_email TEXT NOT NULL DEFAULT '',
            classic_mirror TEXT NOT NULL DEFAULT '',
            classic_cookie TEXT NOT NULL DEFAULT '',
            alt_email TEXT NOT NULL DEFAULT '',
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (classic_cookie = '' OR classic_mirror <> '')
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
