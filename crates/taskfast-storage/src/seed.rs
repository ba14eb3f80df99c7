//! Welcome tasks for a fresh install.

use tracing::info;

use taskfast_core::error::TaskfastError;
use taskfast_core::types::{Owner, Priority, TaskDraft};

use crate::repository::TaskRepository;

fn welcome_tasks() -> Vec<TaskDraft> {
    let owner = Owner::anonymous();
    vec![
        TaskDraft {
            description: Some("This is your first task. Click to edit or mark as complete.".into()),
            priority: Some(Priority::Medium),
            ..TaskDraft::new("Welcome to TaskFast!", owner.clone())
        },
        TaskDraft {
            description: Some("Tasks are now stored in a real database.".into()),
            priority: Some(Priority::High),
            completed: Some(true),
            ..TaskDraft::new("Learn Database Integration", owner.clone())
        },
        TaskDraft {
            description: Some("Create, edit, and delete tasks to test the full CRUD functionality.".into()),
            priority: Some(Priority::Low),
            ..TaskDraft::new("Test Task Management", owner)
        },
    ]
}

/// Inserts the welcome tasks when the store is empty. Returns how many were
/// inserted.
pub fn seed_if_empty(repo: &TaskRepository) -> Result<usize, TaskfastError> {
    if repo.count()? > 0 {
        info!("Task store not empty, skipping seed");
        return Ok(0);
    }
    let drafts = welcome_tasks();
    for draft in &drafts {
        repo.create(draft)?;
    }
    info!(count = drafts.len(), "Seeded welcome tasks");
    Ok(drafts.len())
}
