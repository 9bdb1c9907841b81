//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &MIGRATION_V1).await?;
    }
    if version < 2 {
        apply(conn, 2, &MIGRATION_V2).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Version 1: contact details, distribution flags and the tombstone flag
const MIGRATION_V1: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS guests (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL DEFAULT '',
        phone_number TEXT NOT NULL DEFAULT '',
        company_name TEXT NOT NULL DEFAULT '',
        attending INTEGER NOT NULL DEFAULT 0,
        has_lanyard INTEGER NOT NULL DEFAULT 0,
        has_gift INTEGER NOT NULL DEFAULT 0,
        has_food_coupon INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_guests_deleted ON guests(deleted)",
    "CREATE INDEX IF NOT EXISTS idx_guests_name ON guests(name COLLATE NOCASE)",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Version 2: additive payment and categorisation columns
const MIGRATION_V2: [&str; 5] = [
    "ALTER TABLE guests ADD COLUMN remarks TEXT",
    "ALTER TABLE guests ADD COLUMN payment_mode TEXT",
    "ALTER TABLE guests ADD COLUMN amount TEXT",
    "ALTER TABLE guests ADD COLUMN category TEXT",
    "INSERT INTO schema_version (version) VALUES (2)",
];

/// Apply one migration inside a transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated guest database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}
