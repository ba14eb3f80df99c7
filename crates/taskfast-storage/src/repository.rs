//! SQLite-backed task repository.
//!
//! Every mutating operation is owner-scoped. A task owned by someone else
//! is reported exactly like a missing one.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use taskfast_core::error::TaskfastError;
use taskfast_core::types::{
    DueDate, Owner, Priority, Task, TaskDraft, TaskFilters, TaskId, TaskPatch,
};

use crate::db::Database;

const TASK_COLUMNS: &str = "id, title, description, priority, due_date, start_time, end_time, \
                            completed, owner, created_at";

/// Generates a 24-hex-character id: 4 bytes of creation seconds followed by
/// 8 random bytes.
pub fn generate_task_id(created_at: &DateTime<Utc>) -> TaskId {
    let seconds = created_at.timestamp().clamp(0, u32::MAX as i64) as u32;
    let random: [u8; 8] = rand::rng().random();
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&seconds.to_be_bytes());
    bytes[4..].copy_from_slice(&random);
    TaskId::new(hex::encode(bytes))
}

/// Repository for task records.
pub struct TaskRepository {
    db: Arc<Database>,
}

impl TaskRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new task, applying defaults for omitted fields.
    pub fn create(&self, draft: &TaskDraft) -> Result<Task, TaskfastError> {
        draft.validate()?;
        // Rows keep millisecond precision.
        let now = Utc::now();
        let created_at = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        let task = Task {
            id: generate_task_id(&created_at),
            title: draft.title.trim().to_string(),
            description: draft.description.clone().unwrap_or_default(),
            priority: draft.priority.unwrap_or_default(),
            due_date: draft.due_date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            completed: draft.completed.unwrap_or(false),
            owner: draft.owner.clone(),
            created_at,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, description, priority, due_date, start_time,
                                    end_time, completed, owner, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.id.as_str(),
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date.map(|d| d.to_string()),
                    task.start_time.map(|t| t.timestamp_millis()),
                    task.end_time.map(|t| t.timestamp_millis()),
                    task.completed as i32,
                    task.owner.as_str(),
                    task.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| TaskfastError::Storage(format!("Failed to save task: {}", e)))?;
            Ok(())
        })?;

        info!(task_id = %task.id, owner = %task.owner, "Task created");
        Ok(task)
    }

    /// Fetch a task by id. With an owner given, a foreign task is `None`.
    pub fn get(&self, id: &TaskId, owner: Option<&Owner>) -> Result<Option<Task>, TaskfastError> {
        self.db
            .with_conn(|conn| find(conn, id, owner))
    }

    /// Apply a partial update to a task owned by `owner`.
    pub fn update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        owner: &Owner,
    ) -> Result<Task, TaskfastError> {
        patch.validate()?;
        let task = self.db.with_conn(|conn| {
            let mut task = find(conn, id, Some(owner))?.ok_or_else(TaskfastError::task_not_found)?;
            patch.apply(&mut task);
            conn.execute(
                "UPDATE tasks
                 SET title = ?2, description = ?3, priority = ?4, due_date = ?5,
                     start_time = ?6, end_time = ?7, completed = ?8
                 WHERE id = ?1 AND owner = ?9",
                params![
                    task.id.as_str(),
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date.map(|d| d.to_string()),
                    task.start_time.map(|t| t.timestamp_millis()),
                    task.end_time.map(|t| t.timestamp_millis()),
                    task.completed as i32,
                    owner.as_str(),
                ],
            )
            .map_err(|e| TaskfastError::Storage(format!("Failed to update task: {}", e)))?;
            Ok(task)
        })?;

        debug!(task_id = %task.id, "Task updated");
        Ok(task)
    }

    /// Delete a task by id, returning the removed record.
    pub fn delete(&self, id: &TaskId, owner: &Owner) -> Result<Task, TaskfastError> {
        let task = self.db.with_conn(|conn| {
            let task = find(conn, id, Some(owner))?.ok_or_else(TaskfastError::task_not_found)?;
            remove(conn, &task.id)?;
            Ok(task)
        })?;
        info!(task_id = %task.id, owner = %owner, "Task deleted");
        Ok(task)
    }

    /// Delete the oldest task whose title matches `title` exactly, ignoring
    /// case and surrounding whitespace. Removes at most one record.
    pub fn delete_by_title(&self, title: &str, owner: &Owner) -> Result<Task, TaskfastError> {
        let wanted = title.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(TaskfastError::Validation("id or title required".to_string()));
        }

        let task = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE owner = ?1
                     ORDER BY created_at ASC, rowid ASC"
                ))
                .map_err(|e| TaskfastError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![owner.as_str()], |row| Ok(row_to_task(row)))
                .map_err(|e| TaskfastError::Storage(e.to_string()))?;

            let mut target = None;
            for row in rows {
                let task = row.map_err(|e| TaskfastError::Storage(e.to_string()))??;
                if task.title.trim().to_lowercase() == wanted {
                    target = Some(task);
                    break;
                }
            }

            let task = target.ok_or_else(TaskfastError::task_not_found)?;
            remove(conn, &task.id)?;
            Ok(task)
        })?;

        info!(task_id = %task.id, owner = %owner, "Task deleted by title");
        Ok(task)
    }

    /// List tasks newest first. Tasks created in the same millisecond come
    /// back in reverse insertion order.
    pub fn list(&self, filters: &TaskFilters) -> Result<Vec<Task>, TaskfastError> {
        self.db.with_conn(|conn| {
            let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1 = 1");
            let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(owner) = &filters.owner {
                args.push(Box::new(owner.as_str().to_string()));
                sql.push_str(&format!(" AND owner = ?{}", args.len()));
            }
            if let Some(priority) = filters.priority {
                args.push(Box::new(priority.as_str()));
                sql.push_str(&format!(" AND priority = ?{}", args.len()));
            }
            if let Some(completed) = filters.completed {
                args.push(Box::new(completed as i32));
                sql.push_str(&format!(" AND completed = ?{}", args.len()));
            }
            sql.push_str(" ORDER BY created_at DESC, rowid DESC");
            if let Some(limit) = filters.limit {
                args.push(Box::new(limit as i64));
                sql.push_str(&format!(" LIMIT ?{}", args.len()));
            }

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TaskfastError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                    Ok(row_to_task(row))
                })
                .map_err(|e| TaskfastError::Storage(e.to_string()))?;

            let mut tasks = Vec::new();
            for row in rows {
                tasks.push(row.map_err(|e| TaskfastError::Storage(e.to_string()))??);
            }
            Ok(tasks)
        })
    }

    /// Count all stored tasks.
    pub fn count(&self) -> Result<u64, TaskfastError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
                .map_err(|e| TaskfastError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn find(conn: &Connection, id: &TaskId, owner: Option<&Owner>) -> Result<Option<Task>, TaskfastError> {
    let result = match owner {
        Some(owner) => conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND owner = ?2"),
                params![id.as_str(), owner.as_str()],
                |row| Ok(row_to_task(row)),
            )
            .optional(),
        None => conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.as_str()],
                |row| Ok(row_to_task(row)),
            )
            .optional(),
    }
    .map_err(|e| TaskfastError::Storage(e.to_string()))?;

    result.transpose()
}

fn remove(conn: &Connection, id: &TaskId) -> Result<(), TaskfastError> {
    conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.as_str()])
        .map_err(|e| TaskfastError::Storage(format!("Failed to delete task: {}", e)))?;
    Ok(())
}

fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>, TaskfastError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| TaskfastError::Storage(format!("Invalid timestamp: {}", millis)))
}

fn row_to_task(row: &Row<'_>) -> Result<Task, TaskfastError> {
    let storage = |e: rusqlite::Error| TaskfastError::Storage(e.to_string());

    let id: String = row.get(0).map_err(storage)?;
    let title: String = row.get(1).map_err(storage)?;
    let description: String = row.get(2).map_err(storage)?;
    let priority: String = row.get(3).map_err(storage)?;
    let due_date: Option<String> = row.get(4).map_err(storage)?;
    let start_time: Option<i64> = row.get(5).map_err(storage)?;
    let end_time: Option<i64> = row.get(6).map_err(storage)?;
    let completed: i32 = row.get(7).map_err(storage)?;
    let owner: String = row.get(8).map_err(storage)?;
    let created_at: i64 = row.get(9).map_err(storage)?;

    let due_date = due_date
        .map(|d| {
            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .map(DueDate)
                .map_err(|e| TaskfastError::Storage(format!("Invalid due date '{}': {}", d, e)))
        })
        .transpose()?;

    Ok(Task {
        id: TaskId::new(id),
        title,
        description,
        priority: priority.parse::<Priority>()?,
        due_date,
        start_time: start_time.map(millis_to_utc).transpose()?,
        end_time: end_time.map(millis_to_utc).transpose()?,
        completed: completed != 0,
        owner: Owner::resolve(Some(&owner)),
        created_at: millis_to_utc(created_at)?,
    })
}
