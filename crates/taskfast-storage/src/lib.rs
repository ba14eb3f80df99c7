//! TaskFast storage: SQLite persistence for task records.
//!
//! Provides a WAL-mode database with migrations, the owner-scoped task
//! repository and first-run seeding.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod seed;

pub use db::Database;
pub use repository::{generate_task_id, TaskRepository};
pub use seed::seed_if_empty;
