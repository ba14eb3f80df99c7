//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex. WAL mode and the usual
//! PRAGMAs are set on open, then pending migrations run.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use taskfast_core::error::TaskfastError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path, creating the parent
    /// directory if needed.
    pub fn new(path: &Path) -> Result<Self, TaskfastError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| TaskfastError::Storage(format!("Failed to open database: {}", e)))?;
        configure(&conn, true)?;
        info!(path = %path.display(), "Database opened");

        Self::migrated(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, TaskfastError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TaskfastError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        configure(&conn, false)?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, TaskfastError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with the underlying connection. The mutex is held
    /// for the duration of the closure, so a closure sees a consistent view.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TaskfastError>
    where
        F: FnOnce(&Connection) -> Result<T, TaskfastError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TaskfastError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

fn configure(conn: &Connection, file_backed: bool) -> Result<(), TaskfastError> {
    let pragmas = if file_backed {
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA cache_size = -16384;"
    } else {
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;"
    };
    conn.execute_batch(pragmas)
        .map_err(|e| TaskfastError::Storage(format!("Failed to set pragmas: {}", e)))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_tasks(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
                .map_err(|e| TaskfastError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count_tasks(&db), 0);
    }

    #[test]
    fn test_file_database_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskfast.db");
        let db = Database::new(&path).unwrap();
        assert_eq!(count_tasks(&db), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskfast.db");
        {
            let db = Database::new(&path).unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO tasks (id, title, created_at) VALUES ('abc', 'kept', 1)",
                    [],
                )
                .map_err(|e| TaskfastError::Storage(e.to_string()))?;
                Ok(())
            })
            .unwrap();
        }
        let db = Database::new(&path).unwrap();
        assert_eq!(count_tasks(&db), 1);
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        let mode: String = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(|e| TaskfastError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
