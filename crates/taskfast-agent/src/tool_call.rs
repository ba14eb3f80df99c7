//! Named tool invocations and their JSON schemas.
//!
//! A [`ToolCall`] is the single dispatch point between a caller (the
//! dialogue orchestrator, or an external model calling tools by name) and
//! [`TaskTools`]. The caller's identity is injected at dispatch time and
//! never read from arguments.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use taskfast_core::fields::TaskFields;
use taskfast_core::types::{CompletionFlag, Owner, Priority, TaskDraft, TaskFilters, TaskId, TaskPatch};

use crate::tools::{DeleteTarget, TaskTools, ToolResult};

#[derive(Clone, Debug, PartialEq)]
pub enum ToolCall {
    CreateTask(TaskDraft),
    UpdateTask {
        id: TaskId,
        patch: TaskPatch,
    },
    DeleteTask {
        id: Option<String>,
        title: Option<String>,
    },
    ListTasks {
        priority: Option<Priority>,
        completed: Option<bool>,
    },
}

#[derive(Deserialize)]
struct TargetArgs {
    id: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ListArgs {
    priority: Option<Priority>,
    completed: Option<CompletionFlag>,
}

impl ToolCall {
    pub const NAMES: [&'static str; 4] = ["createTask", "updateTask", "deleteTask", "listTasks"];

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CreateTask(_) => "createTask",
            ToolCall::UpdateTask { .. } => "updateTask",
            ToolCall::DeleteTask { .. } => "deleteTask",
            ToolCall::ListTasks { .. } => "listTasks",
        }
    }

    /// Builds a call from a tool name and JSON arguments. The error is a
    /// message fit for a failed [`ToolResult`].
    pub fn from_parts(name: &str, arguments: Value) -> Result<Self, String> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };
        match name {
            "createTask" => {
                let fields: TaskFields = parse_args(arguments)?;
                fields
                    .into_draft(Owner::anonymous())
                    .map(ToolCall::CreateTask)
                    .map_err(|e| e.to_string())
            }
            "updateTask" => {
                let target: TargetArgs = parse_args(arguments.clone())?;
                let id = target
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| "id is required".to_string())?;
                let fields: TaskFields = parse_args(arguments)?;
                let patch = fields.into_patch().map_err(|e| e.to_string())?;
                Ok(ToolCall::UpdateTask {
                    id: TaskId::from(id.as_str()),
                    patch,
                })
            }
            "deleteTask" => {
                let target: TargetArgs = parse_args(arguments)?;
                Ok(ToolCall::DeleteTask {
                    id: target.id,
                    title: target.title,
                })
            }
            "listTasks" => {
                let list: ListArgs = parse_args(arguments)?;
                Ok(ToolCall::ListTasks {
                    priority: list.priority,
                    completed: list.completed.map(|c| c.0),
                })
            }
            other => Err(format!("Unknown tool: {other}")),
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, String> {
    serde_json::from_value(arguments).map_err(|e| format!("invalid arguments: {e}"))
}

/// Runs a call against `tools` on behalf of `owner`.
pub async fn dispatch(tools: &dyn TaskTools, call: ToolCall, owner: &Owner) -> ToolResult {
    debug!(tool = call.name(), owner = %owner, "dispatching tool call");
    match call {
        ToolCall::CreateTask(mut draft) => {
            draft.owner = owner.clone();
            tools.create(draft).await
        }
        ToolCall::UpdateTask { id, patch } => tools.update(id, patch, owner.clone()).await,
        ToolCall::DeleteTask { id, title } => {
            match DeleteTarget::from_parts(id.as_deref(), title.as_deref()) {
                Some(target) => tools.delete(target, owner.clone()).await,
                None => ToolResult::failure("id or title required"),
            }
        }
        ToolCall::ListTasks {
            priority,
            completed,
        } => {
            let filters = TaskFilters {
                owner: Some(owner.clone()),
                priority,
                completed,
                limit: None,
            };
            tools.list(filters).await
        }
    }
}

/// Parses and runs a named call; argument errors become failed results.
pub async fn dispatch_named(
    tools: &dyn TaskTools,
    name: &str,
    arguments: Value,
    owner: &Owner,
) -> ToolResult {
    match ToolCall::from_parts(name, arguments) {
        Ok(call) => dispatch(tools, call, owner).await,
        Err(message) => ToolResult::failure(message),
    }
}

/// Function-calling definitions for the task tools.
pub fn tool_definitions() -> Value {
    let schedule = json!({
        "dueDate": {"type": "string", "description": "Due date (YYYY-MM-DD)"},
        "startTime": {"type": "string", "description": "Start time, ISO 8601 or HH:MM with dueDate"},
        "endTime": {"type": "string", "description": "End time, ISO 8601 or HH:MM with dueDate"},
    });
    let priority = json!({"type": "string", "enum": ["low", "medium", "high"]});

    let mut create_props = json!({
        "title": {"type": "string", "description": "Task title"},
        "description": {"type": "string", "description": "Task description"},
        "priority": priority,
        "completed": {"type": "boolean"},
    });
    let mut update_props = json!({
        "id": {"type": "string", "description": "Task ID"},
        "title": {"type": "string"},
        "description": {"type": "string"},
        "priority": priority,
        "completed": {"type": "boolean"},
    });
    if let (Some(create), Some(update), Some(extra)) = (
        create_props.as_object_mut(),
        update_props.as_object_mut(),
        schedule.as_object(),
    ) {
        for (key, value) in extra {
            create.insert(key.clone(), value.clone());
            update.insert(key.clone(), value.clone());
        }
    }

    json!([
        {
            "name": "createTask",
            "description": "Create a new task for the current user",
            "parameters": {"type": "object", "properties": create_props, "required": ["title"]}
        },
        {
            "name": "updateTask",
            "description": "Update an existing task by ID",
            "parameters": {"type": "object", "properties": update_props, "required": ["id"]}
        },
        {
            "name": "deleteTask",
            "description": "Delete a task by ID, or by exact title",
            "parameters": {
                "type": "object",
                "properties": {
                    "id": {"type": "string", "description": "Task ID"},
                    "title": {"type": "string", "description": "Exact task title"}
                }
            }
        },
        {
            "name": "listTasks",
            "description": "List the current user's tasks, newest first",
            "parameters": {
                "type": "object",
                "properties": {
                    "priority": priority,
                    "completed": {"type": "boolean"}
                }
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use taskfast_storage::{Database, TaskRepository};

    use crate::tools::RepositoryTools;

    fn make_tools() -> RepositoryTools {
        let db = Arc::new(Database::in_memory().unwrap());
        RepositoryTools::new(Arc::new(TaskRepository::new(db)))
    }

    fn ada() -> Owner {
        Owner::resolve(Some("ada@example.com"))
    }

    #[test]
    fn test_from_parts_create() {
        let call = ToolCall::from_parts(
            "createTask",
            json!({"title": "Standup", "priority": "HIGH", "dueDate": "2024-05-01", "startTime": "09:00"}),
        )
        .unwrap();
        let ToolCall::CreateTask(draft) = call else {
            panic!("expected createTask");
        };
        assert_eq!(draft.title, "Standup");
        assert_eq!(draft.priority, Some(Priority::High));
        assert!(draft.start_time.is_some());
    }

    #[test]
    fn test_from_parts_errors() {
        assert_eq!(
            ToolCall::from_parts("createTask", json!({})).unwrap_err(),
            "title is required"
        );
        assert_eq!(
            ToolCall::from_parts("updateTask", json!({"title": "x"})).unwrap_err(),
            "id is required"
        );
        assert_eq!(
            ToolCall::from_parts("archiveTask", json!({})).unwrap_err(),
            "Unknown tool: archiveTask"
        );
        assert!(ToolCall::from_parts("listTasks", json!({"priority": "urgent"}))
            .unwrap_err()
            .starts_with("invalid arguments"));
    }

    #[test]
    fn test_from_parts_list_accepts_null_arguments() {
        assert_eq!(
            ToolCall::from_parts("listTasks", Value::Null).unwrap(),
            ToolCall::ListTasks {
                priority: None,
                completed: None
            }
        );
    }

    #[test]
    fn test_names_match_definitions() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ToolCall::NAMES.to_vec());
        assert_eq!(defs[0]["parameters"]["required"], json!(["title"]));
        assert!(defs[1]["parameters"]["properties"].get("startTime").is_some());
    }

    #[tokio::test]
    async fn test_dispatch_injects_owner() {
        let tools = make_tools();
        let result = dispatch_named(
            &tools,
            "createTask",
            json!({"title": "Mine", "owner": "mallory"}),
            &ada(),
        )
        .await;
        assert_eq!(result.task.unwrap().owner, ada());
    }

    #[tokio::test]
    async fn test_dispatch_delete_requires_target() {
        let tools = make_tools();
        let result = dispatch_named(&tools, "deleteTask", json!({}), &ada()).await;
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("id or title required"));
    }

    #[tokio::test]
    async fn test_dispatch_list_scopes_to_owner() {
        let tools = make_tools();
        dispatch_named(&tools, "createTask", json!({"title": "A"}), &ada()).await;
        dispatch_named(&tools, "createTask", json!({"title": "B"}), &Owner::anonymous()).await;

        let listed = dispatch_named(&tools, "listTasks", json!({}), &ada()).await;
        let tasks = listed.tasks.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "A");
    }

    #[tokio::test]
    async fn test_dispatch_update_round_trip() {
        let tools = make_tools();
        let created = dispatch_named(&tools, "createTask", json!({"title": "Draft"}), &ada())
            .await
            .task
            .unwrap();
        let updated = dispatch_named(
            &tools,
            "updateTask",
            json!({"id": created.id.as_str(), "completed": "yes", "priority": "medium"}),
            &ada(),
        )
        .await
        .task
        .unwrap();
        assert!(updated.completed);
        assert_eq!(updated.priority, Priority::Medium);
    }
}
