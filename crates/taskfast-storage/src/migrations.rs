//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use taskfast_core::error::TaskfastError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), TaskfastError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| TaskfastError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| TaskfastError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: tasks");
    }

    Ok(())
}

/// Version 1: the tasks table.
///
/// Times are UTC milliseconds. `due_date` holds a bare `YYYY-MM-DD` day.
fn apply_v1(conn: &Connection) -> Result<(), TaskfastError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id           TEXT PRIMARY KEY NOT NULL,
            title        TEXT NOT NULL CHECK (length(trim(title)) > 0),
            description  TEXT NOT NULL DEFAULT '',
            priority     TEXT NOT NULL DEFAULT 'low'
                         CHECK (priority IN ('low', 'medium', 'high')),
            due_date     TEXT,
            start_time   INTEGER,
            end_time     INTEGER,
            completed    INTEGER NOT NULL DEFAULT 0,
            owner        TEXT NOT NULL DEFAULT 'temp-user',
            created_at   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_owner_created
            ON tasks (owner, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_tasks_created
            ON tasks (created_at DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'tasks');
        ",
    )
    .map_err(|e| TaskfastError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
