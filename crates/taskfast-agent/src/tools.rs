//! Task tools: owner-scoped CRUD operations that report success or failure
//! as data rather than as errors.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use taskfast_core::error::TaskfastError;
use taskfast_core::normalize;
use taskfast_core::types::{Owner, Task, TaskDraft, TaskFilters, TaskId, TaskPatch};
use taskfast_storage::TaskRepository;

/// Shown when a failure carries no message of its own.
pub const GENERIC_FAILURE: &str = "Something went wrong.";

/// Outcome of a tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResult {
    pub fn with_task(task: Task) -> Self {
        Self {
            success: true,
            task: Some(task),
            tasks: None,
            message: None,
        }
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            success: true,
            task: None,
            tasks: Some(tasks),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            task: None,
            tasks: None,
            message: Some(message.into()),
        }
    }

    /// Failure message, or the generic fallback.
    pub fn failure_message(&self) -> &str {
        self.message.as_deref().unwrap_or(GENERIC_FAILURE)
    }
}

impl From<TaskfastError> for ToolResult {
    fn from(err: TaskfastError) -> Self {
        match err {
            TaskfastError::Validation(msg) => ToolResult::failure(msg),
            TaskfastError::NotFound(_) => ToolResult::failure("Task not found"),
            other => {
                warn!(error = %other, "task tool failed");
                ToolResult::failure(other.to_string())
            }
        }
    }
}

/// How a delete names its target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    Id(TaskId),
    Title(String),
}

impl DeleteTarget {
    /// An id wins over a title; blank values are ignored.
    pub fn from_parts(id: Option<&str>, title: Option<&str>) -> Option<Self> {
        let id = id.map(str::trim).filter(|s| !s.is_empty());
        let title = title.map(str::trim).filter(|s| !s.is_empty());
        match (id, title) {
            (Some(id), _) => Some(DeleteTarget::Id(TaskId::from(id))),
            (None, Some(title)) => Some(DeleteTarget::Title(title.to_string())),
            (None, None) => None,
        }
    }
}

/// Owner-scoped task operations used by the agent.
///
/// Every method returns a [`ToolResult`]; domain failures such as a missing
/// title or an unknown id are `success: false` results, not errors.
#[async_trait]
pub trait TaskTools: Send + Sync {
    async fn create(&self, draft: TaskDraft) -> ToolResult;
    async fn update(&self, id: TaskId, patch: TaskPatch, owner: Owner) -> ToolResult;
    async fn delete(&self, target: DeleteTarget, owner: Owner) -> ToolResult;
    async fn list(&self, filters: TaskFilters) -> ToolResult;
}

/// [`TaskTools`] backed by the SQLite task repository.
pub struct RepositoryTools {
    repo: Arc<TaskRepository>,
}

impl RepositoryTools {
    pub fn new(repo: Arc<TaskRepository>) -> Self {
        Self { repo }
    }

    fn checked_update(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
        owner: &Owner,
    ) -> Result<Task, TaskfastError> {
        patch.validate()?;
        let mut merged = self
            .repo
            .get(id, Some(owner))?
            .ok_or_else(TaskfastError::task_not_found)?;
        patch.apply(&mut merged);
        normalize::validate_schedule(merged.start_time.as_ref(), merged.end_time.as_ref())?;
        self.repo.update(id, patch, owner)
    }
}

#[async_trait]
impl TaskTools for RepositoryTools {
    async fn create(&self, draft: TaskDraft) -> ToolResult {
        let created = draft
            .validate()
            .and_then(|_| {
                normalize::validate_schedule(draft.start_time.as_ref(), draft.end_time.as_ref())
            })
            .and_then(|_| self.repo.create(&draft));
        match created {
            Ok(task) => {
                debug!(task_id = %task.id, owner = %task.owner, "task created");
                ToolResult::with_task(task)
            }
            Err(err) => err.into(),
        }
    }

    async fn update(&self, id: TaskId, patch: TaskPatch, owner: Owner) -> ToolResult {
        match self.checked_update(&id, &patch, &owner) {
            Ok(task) => {
                debug!(task_id = %task.id, "task updated");
                ToolResult::with_task(task)
            }
            Err(err) => err.into(),
        }
    }

    async fn delete(&self, target: DeleteTarget, owner: Owner) -> ToolResult {
        let removed = match &target {
            DeleteTarget::Id(id) => self.repo.delete(id, &owner),
            DeleteTarget::Title(title) => self.repo.delete_by_title(title, &owner),
        };
        match removed {
            Ok(task) => {
                debug!(task_id = %task.id, "task deleted");
                ToolResult::with_task(task)
            }
            Err(err) => err.into(),
        }
    }

    async fn list(&self, filters: TaskFilters) -> ToolResult {
        match self.repo.list(&filters) {
            Ok(tasks) => ToolResult::with_tasks(tasks),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskfast_core::types::Priority;
    use taskfast_storage::Database;

    fn make_tools() -> RepositoryTools {
        let db = Arc::new(Database::in_memory().unwrap());
        RepositoryTools::new(Arc::new(TaskRepository::new(db)))
    }

    fn ada() -> Owner {
        Owner::resolve(Some("ada@example.com"))
    }

    async fn create(tools: &RepositoryTools, title: &str, owner: Owner) -> Task {
        tools
            .create(TaskDraft::new(title, owner))
            .await
            .task
            .unwrap()
    }

    // ---- create ----

    #[tokio::test]
    async fn test_create_returns_task() {
        let tools = make_tools();
        let result = tools.create(TaskDraft::new("Buy milk", ada())).await;
        assert!(result.success);
        let task = result.task.unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.owner, ada());
    }

    #[tokio::test]
    async fn test_create_without_title_fails() {
        let tools = make_tools();
        let result = tools.create(TaskDraft::new("  ", ada())).await;
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("title is required"));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_schedule() {
        let tools = make_tools();
        let mut draft = TaskDraft::new("Meeting", ada());
        draft.start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        draft.end_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let result = tools.create(draft).await;
        assert_eq!(result.message.as_deref(), Some("startTime must be before endTime"));
    }

    // ---- update ----

    #[tokio::test]
    async fn test_update_is_owner_scoped() {
        let tools = make_tools();
        let task = create(&tools, "Private", ada()).await;
        let patch = TaskPatch {
            completed: Some(true),
            ..Default::default()
        };

        let foreign = tools
            .update(task.id.clone(), patch.clone(), Owner::anonymous())
            .await;
        assert!(!foreign.success);
        assert_eq!(foreign.message.as_deref(), Some("Task not found"));

        let own = tools.update(task.id, patch, ada()).await;
        assert!(own.success);
        assert!(own.task.unwrap().completed);
    }

    #[tokio::test]
    async fn test_update_checks_schedule_against_stored_times() {
        let tools = make_tools();
        let mut draft = TaskDraft::new("Meeting", ada());
        draft.start_time = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let task = tools.create(draft).await.task.unwrap();

        let patch = TaskPatch {
            end_time: Some(Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())),
            ..Default::default()
        };
        let result = tools.update(task.id, patch, ada()).await;
        assert_eq!(result.message.as_deref(), Some("startTime must be before endTime"));
    }

    // ---- delete ----

    #[tokio::test]
    async fn test_delete_by_id_and_title() {
        let tools = make_tools();
        let first = create(&tools, "Pay rent", ada()).await;
        create(&tools, "Walk dog", ada()).await;

        let by_id = tools.delete(DeleteTarget::Id(first.id.clone()), ada()).await;
        assert!(by_id.success);
        assert_eq!(by_id.task.unwrap().id, first.id);

        let by_title = tools
            .delete(DeleteTarget::Title("walk DOG".to_string()), ada())
            .await;
        assert!(by_title.success);

        let listed = tools.list(TaskFilters::for_owner(ada())).await;
        assert!(listed.tasks.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_fails() {
        let tools = make_tools();
        let result = tools
            .delete(DeleteTarget::Id(TaskId::new("000000000000000000000000")), ada())
            .await;
        assert!(!result.success);
        assert_eq!(result.failure_message(), "Task not found");
    }

    #[test]
    fn test_delete_target_prefers_id() {
        assert_eq!(
            DeleteTarget::from_parts(Some(" ABC "), Some("x")),
            Some(DeleteTarget::Id(TaskId::new("abc")))
        );
        assert_eq!(
            DeleteTarget::from_parts(Some(""), Some("Title")),
            Some(DeleteTarget::Title("Title".to_string()))
        );
        assert_eq!(DeleteTarget::from_parts(None, Some("  ")), None);
    }

    // ---- list ----

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let tools = make_tools();
        let mut urgent = TaskDraft::new("Urgent", ada());
        urgent.priority = Some(Priority::High);
        tools.create(urgent).await;
        create(&tools, "Later", ada()).await;
        create(&tools, "Someone else's", Owner::anonymous()).await;

        let all = tools.list(TaskFilters::for_owner(ada())).await.tasks.unwrap();
        let titles: Vec<&str> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Later", "Urgent"]);

        let high = tools
            .list(TaskFilters {
                priority: Some(Priority::High),
                ..TaskFilters::for_owner(ada())
            })
            .await
            .tasks
            .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].title, "Urgent");
    }

    // ---- errors ----

    #[test]
    fn test_error_messages_are_kept() {
        let result = ToolResult::from(TaskfastError::Storage("database is locked".into()));
        assert!(!result.success);
        assert_eq!(result.failure_message(), "Storage error: database is locked");

        let result = ToolResult::from(TaskfastError::task_not_found());
        assert_eq!(result.failure_message(), "Task not found");
    }

    #[test]
    fn test_tool_result_serialization_omits_empty_fields() {
        let json = serde_json::to_value(ToolResult::failure("Task not found")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "Task not found"}));
    }
}
