//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

use taskfast_agent::{
    dispatch_named, tool_definitions, AgentReply, Intent, ToolResult, TranscriptMessage,
};
use taskfast_core::error::TaskfastError;
use taskfast_core::fields::TaskFields;
use taskfast_core::normalize;
use taskfast_core::types::{completion_flag_from_text, Priority, Task, TaskFilters, TaskId};

use crate::error::{ApiError, ApiJson};
use crate::identity::{explicit_identity, resolve_owner, IdentityParams};
use crate::state::AppState;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub user_email: Option<String>,
    pub owner: Option<String>,
    pub priority: Option<String>,
    pub completed: Option<String>,
    pub limit: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub task_count: u64,
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub success: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentMessageResponse {
    pub success: bool,
    #[serde(flatten)]
    pub reply: AgentReply,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub success: bool,
    pub conversation_id: String,
    pub messages: Vec<TranscriptMessage>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Task change kinds carried on the event stream.
#[derive(Debug, Clone, Copy)]
enum Change {
    Created,
    Updated,
    Deleted,
}

impl Change {
    fn as_str(self) -> &'static str {
        match self {
            Change::Created => "created",
            Change::Updated => "updated",
            Change::Deleted => "deleted",
        }
    }

    fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::AddTask => Some(Change::Created),
            Intent::UpdateTask => Some(Change::Updated),
            Intent::DeleteTask => Some(Change::Deleted),
            Intent::ListTasks => None,
        }
    }

    fn for_tool(name: &str) -> Option<Self> {
        match name {
            "createTask" => Some(Change::Created),
            "updateTask" => Some(Change::Updated),
            "deleteTask" => Some(Change::Deleted),
            _ => None,
        }
    }
}

fn publish(state: &AppState, change: Change, task: &Task, source: &str) {
    let event = json!({
        "type": change.as_str(),
        "source": source,
        "task": task,
    });
    // Sending fails only when nobody is subscribed.
    let _ = state.event_tx.send(event);
}

fn publish_result(state: &AppState, change: Option<Change>, result: &ToolResult, source: &str) {
    if let (Some(change), true, Some(task)) = (change, result.success, result.task.as_ref()) {
        publish(state, change, task, source);
    }
}

/// Identity fields carried in a JSON body; anything unparseable counts as absent.
fn body_identity(body: &Value) -> IdentityParams {
    serde_json::from_value(body.clone()).unwrap_or_default()
}

fn parse_fields(body: Value) -> Result<TaskFields, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_priority(raw: Option<&str>) -> Result<Option<Priority>, ApiError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Priority>().map_err(ApiError::from))
        .transpose()
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let task_count = state.repo.count()?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        task_count,
    }))
}

// =============================================================================
// Tasks
// =============================================================================

/// GET /api/tasks - list tasks, newest first.
///
/// Scoped to the caller when an identity is supplied; unscoped otherwise.
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<TasksResponse>, ApiError> {
    let identity = IdentityParams {
        user_email: params.user_email.clone(),
        owner: params.owner.clone(),
    };
    let filters = TaskFilters {
        owner: explicit_identity(&headers, &identity),
        priority: parse_priority(params.priority.as_deref())?,
        completed: params
            .completed
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(completion_flag_from_text),
        limit: params.limit,
    };
    let tasks = state.repo.list(&filters)?;
    Ok(Json(TasksResponse {
        success: true,
        tasks,
    }))
}

/// POST /api/tasks - create a task.
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = resolve_owner(&headers, &body_identity(&body));
    let draft = parse_fields(body)?.into_draft(owner)?;
    let task = state.repo.create(&draft)?;
    publish(&state, Change::Created, &task, "rest");
    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            success: true,
            task,
        }),
    ))
}

/// GET /api/tasks/{id} - fetch one task.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(identity): Query<IdentityParams>,
) -> Result<Json<TaskResponse>, ApiError> {
    let owner = explicit_identity(&headers, &identity);
    let task = state
        .repo
        .get(&TaskId::from(id.as_str()), owner.as_ref())?
        .ok_or_else(TaskfastError::task_not_found)?;
    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}

/// PUT /api/tasks/{id} - partial update, scoped to the caller.
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<TaskResponse>, ApiError> {
    let owner = resolve_owner(&headers, &body_identity(&body));
    let id = TaskId::from(id.as_str());
    let patch = parse_fields(body)?.into_patch()?;

    let mut merged = state
        .repo
        .get(&id, Some(&owner))?
        .ok_or_else(TaskfastError::task_not_found)?;
    patch.apply(&mut merged);
    normalize::validate_schedule(merged.start_time.as_ref(), merged.end_time.as_ref())?;

    let task = state.repo.update(&id, &patch, &owner)?;
    publish(&state, Change::Updated, &task, "rest");
    Ok(Json(TaskResponse {
        success: true,
        task,
    }))
}

/// DELETE /api/tasks/{id} - delete, scoped to the caller.
///
/// The identity may come from the header, the query string or a JSON body.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<IdentityParams>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let identity = match explicit_identity(&headers, &query) {
        Some(owner) => owner,
        None => {
            let params: IdentityParams = serde_json::from_slice(&body).unwrap_or_default();
            resolve_owner(&headers, &params)
        }
    };
    let task = state.repo.delete(&TaskId::from(id.as_str()), &identity)?;
    publish(&state, Change::Deleted, &task, "rest");
    Ok(Json(MessageResponse {
        success: true,
        message: "Task deleted successfully".to_string(),
    }))
}

/// GET /api/tasks/stream - SSE stream of task changes.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(value) => {
            let data = serde_json::to_string(&value).unwrap_or_default();
            Some(Ok(Event::default()
                .event("task")
                .id(Uuid::new_v4().to_string())
                .data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

// =============================================================================
// Agent
// =============================================================================

/// GET /api/agent/health
pub async fn agent_health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// POST /api/agent/messages - one conversational turn.
pub async fn agent_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<AgentMessageResponse>, ApiError> {
    let conversation_id = match body.get("conversationId") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let owner = resolve_owner(&headers, &body_identity(&body));

    let reply = state
        .orchestrator
        .handle_message(&conversation_id, message, &owner)
        .await?;
    debug!(
        conversation_id = %reply.conversation_id,
        owner = %owner,
        pending = ?reply.pending_slot,
        "agent replied"
    );

    if let (Some(intent), Some(result)) = (reply.intent, reply.tool_result.as_ref()) {
        publish_result(&state, Change::for_intent(intent), result, "agent");
    }

    Ok(Json(AgentMessageResponse {
        success: true,
        reply,
    }))
}

/// GET /api/agent/conversations/{id}/messages - the caller's transcript.
pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Query(identity): Query<IdentityParams>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let owner = resolve_owner(&headers, &identity);
    let messages = state.orchestrator.history(&conversation_id, &owner)?;
    Ok(Json(TranscriptResponse {
        success: true,
        conversation_id,
        messages,
    }))
}

/// GET /api/agent/tools - function-calling definitions.
pub async fn agent_tools() -> Json<Value> {
    Json(json!({ "success": true, "tools": tool_definitions() }))
}

/// POST /api/agent/tools/call - run one named tool as the caller.
///
/// Tool failures are reported in the result body, not as HTTP errors.
pub async fn call_tool(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<ToolResult>, ApiError> {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?
        .to_string();
    let arguments = body.get("arguments").cloned().unwrap_or(Value::Null);
    let owner = resolve_owner(&headers, &body_identity(&body));

    let result = dispatch_named(state.tools.as_ref(), &name, arguments, &owner).await;
    info!(tool = %name, owner = %owner, success = result.success, "tool called");
    publish_result(&state, Change::for_tool(&name), &result, "agent");
    Ok(Json(result))
}
