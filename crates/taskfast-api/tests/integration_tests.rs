//! Integration tests for the TaskFast API.
//!
//! Each test builds its own in-memory state and drives the router with
//! `oneshot`, covering the task REST surface, the conversational agent and
//! the tool-call endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use taskfast_api::create_router;
use taskfast_api::handlers::HealthResponse;
use taskfast_api::state::AppState;
use taskfast_core::config::TaskfastConfig;
use taskfast_storage::Database;

// =============================================================================
// Helpers
// =============================================================================

const ADA: &str = "ada@example.com";
const BOB: &str = "bob@example.com";

fn make_state() -> AppState {
    let db = Database::in_memory().unwrap();
    AppState::new(TaskfastConfig::default(), Arc::new(db))
}

fn make_app() -> (AppState, Router) {
    let state = make_state();
    let app = create_router(state.clone());
    (state, app)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-email", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-email", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn delete(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::delete(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-email", user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create(app: &Router, user: Option<&str>, body: Value) -> Value {
    let (status, json) = send(app, with_json("POST", "/api/tasks", user, body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json["task"].clone()
}

async fn say(app: &Router, conversation: &str, user: &str, message: &str) -> Value {
    let body = json!({ "conversationId": conversation, "message": message });
    let (status, json) = send(app, with_json("POST", "/api/agent/messages", Some(user), body)).await;
    assert_eq!(status, StatusCode::OK, "agent failed: {json}");
    json
}

// =============================================================================
// Health and fallbacks
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (_, app) = make_app();
    let resp = app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.task_count, 0);
    assert!(!health.version.is_empty());
}

#[tokio::test]
async fn test_agent_health() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/agent/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "ok": true }));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_malformed_json_is_structured_400() {
    let (_, app) = make_app();
    let req = Request::post("/api/tasks")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_missing_content_type_is_400() {
    let (_, app) = make_app();
    let req = Request::post("/api/tasks")
        .body(Body::from(r#"{"title":"x"}"#))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

// =============================================================================
// Task CRUD
// =============================================================================

#[tokio::test]
async fn test_create_and_get_task() {
    let (_, app) = make_app();
    let task = create(
        &app,
        Some(ADA),
        json!({
            "title": "Pay rent",
            "description": "before the 5th",
            "priority": "high",
            "dueDate": "2024-06-01",
            "startTime": "09:00",
            "endTime": "10:30"
        }),
    )
    .await;
    assert_eq!(task["title"], "Pay rent");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["owner"], ADA);
    assert_eq!(task["completed"], false);
    assert_eq!(task["dueDate"], "2024-06-01T00:00:00Z");
    assert_eq!(task["startTime"], "2024-06-01T09:00:00Z");

    let id = task["id"].as_str().unwrap();
    assert_eq!(id.len(), 24);
    let (status, json) = send(&app, get(&format!("/api/tasks/{id}"), Some(ADA))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["task"]["id"], id);
}

#[tokio::test]
async fn test_create_requires_title() {
    let (_, app) = make_app();
    let (status, json) = send(
        &app,
        with_json("POST", "/api/tasks", Some(ADA), json!({ "title": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "title is required");
}

#[tokio::test]
async fn test_create_rejects_inverted_schedule() {
    let (_, app) = make_app();
    let body = json!({
        "title": "Backwards",
        "dueDate": "2024-06-01",
        "startTime": "11:00",
        "endTime": "10:00"
    });
    let (status, json) = send(&app, with_json("POST", "/api/tasks", Some(ADA), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_clock_time_without_due_date_rejected() {
    let (_, app) = make_app();
    let body = json!({ "title": "Floating", "startTime": "09:00" });
    let (status, json) = send(&app, with_json("POST", "/api/tasks", Some(ADA), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "dueDate is required when only a time is given");
}

#[tokio::test]
async fn test_create_without_identity_uses_sentinel_owner() {
    let (_, app) = make_app();
    let task = create(&app, None, json!({ "title": "Anonymous" })).await;
    assert_eq!(task["owner"], "temp-user");
}

#[tokio::test]
async fn test_get_missing_task_is_404() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/tasks/65f0a1b2c3d4e5f6a7b8c9d0", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Task not found");
}

#[tokio::test]
async fn test_update_task() {
    let (_, app) = make_app();
    let task = create(
        &app,
        Some(ADA),
        json!({ "title": "Draft report", "dueDate": "2024-06-01" }),
    )
    .await;
    let id = task["id"].as_str().unwrap();

    let (status, json) = send(
        &app,
        with_json(
            "PUT",
            &format!("/api/tasks/{id}"),
            Some(ADA),
            json!({ "completed": "true", "priority": "medium", "dueDate": null }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["task"]["completed"], true);
    assert_eq!(json["task"]["priority"], "medium");
    assert_eq!(json["task"]["dueDate"], Value::Null);
    assert_eq!(json["task"]["title"], "Draft report");
}

#[tokio::test]
async fn test_update_other_owners_task_is_404() {
    let (_, app) = make_app();
    let task = create(&app, Some(ADA), json!({ "title": "Private" })).await;
    let id = task["id"].as_str().unwrap();

    let (status, json) = send(
        &app,
        with_json("PUT", &format!("/api/tasks/{id}"), Some(BOB), json!({ "title": "Mine now" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Task not found");
}

#[tokio::test]
async fn test_delete_task() {
    let (_, app) = make_app();
    let task = create(&app, Some(ADA), json!({ "title": "Trash" })).await;
    let id = task["id"].as_str().unwrap();

    let (status, _) = send(&app, delete(&format!("/api/tasks/{id}"), Some(BOB))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, delete(&format!("/api/tasks/{id}"), Some(ADA))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({ "success": true, "message": "Task deleted successfully" })
    );

    let (status, _) = send(&app, get(&format!("/api/tasks/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_identity_from_body() {
    let (_, app) = make_app();
    let task = create(&app, Some(ADA), json!({ "title": "Body owner" })).await;
    let id = task["id"].as_str().unwrap();

    let req = with_json(
        "DELETE",
        &format!("/api/tasks/{id}"),
        None,
        json!({ "userEmail": ADA }),
    );
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_is_scoped_by_identity() {
    let (_, app) = make_app();
    create(&app, Some(ADA), json!({ "title": "Ada one", "priority": "high" })).await;
    create(&app, Some(ADA), json!({ "title": "Ada two" })).await;
    create(&app, Some(BOB), json!({ "title": "Bob one" })).await;

    let (_, json) = send(&app, get("/api/tasks", Some(ADA))).await;
    let titles: Vec<&str> = json["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Ada two", "Ada one"]);

    let (_, json) = send(&app, get("/api/tasks?userEmail=bob@example.com", None)).await;
    assert_eq!(json["tasks"].as_array().unwrap().len(), 1);

    let (_, json) = send(&app, get("/api/tasks", None)).await;
    assert_eq!(json["tasks"].as_array().unwrap().len(), 3);

    let (_, json) = send(&app, get("/api/tasks?priority=high", None)).await;
    assert_eq!(json["tasks"][0]["title"], "Ada one");
    assert_eq!(json["tasks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_rejects_unknown_priority() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/tasks?priority=urgent", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_mutations_publish_events() {
    let (state, app) = make_app();
    let mut rx = state.event_tx.subscribe();

    let task = create(&app, Some(ADA), json!({ "title": "Watched" })).await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event["type"], "created");
    assert_eq!(event["source"], "rest");
    assert_eq!(event["task"]["id"], task["id"]);

    let id = task["id"].as_str().unwrap();
    send(&app, delete(&format!("/api/tasks/{id}"), Some(ADA))).await;
    assert_eq!(rx.try_recv().unwrap()["type"], "deleted");

    say(&app, "c1", ADA, "add task \"From chat\"").await;
    let event = rx.try_recv().unwrap();
    assert_eq!(event["source"], "agent");
    assert_eq!(event["task"]["title"], "From chat");
}

// =============================================================================
// Agent conversation
// =============================================================================

#[tokio::test]
async fn test_agent_add_with_all_fields() {
    let (state, app) = make_app();
    let json = say(
        &app,
        "conv-a",
        ADA,
        "Add task \"Pay electricity bill\" tomorrow 9:00 high priority",
    )
    .await;
    assert_eq!(json["success"], true);
    assert_eq!(json["reply"], "Added: Pay electricity bill");
    assert_eq!(json["intent"], "add_task");
    assert_eq!(json["conversationId"], "conv-a");
    assert_eq!(json["toolResult"]["task"]["priority"], "high");
    assert_eq!(state.repo.count().unwrap(), 1);
}

#[tokio::test]
async fn test_agent_asks_for_title_then_creates() {
    let (_, app) = make_app();
    let json = say(&app, "conv-b", ADA, "add a task").await;
    assert_eq!(json["reply"], "What is the task title?");
    assert_eq!(json["pendingSlot"], "title");

    let json = say(&app, "conv-b", ADA, "Buy groceries").await;
    assert_eq!(json["reply"], "Added: Buy groceries");

    let (_, list) = send(&app, get("/api/tasks", Some(ADA))).await;
    assert_eq!(list["tasks"][0]["title"], "Buy groceries");
}

#[tokio::test]
async fn test_agent_delete_by_id() {
    let (_, app) = make_app();
    let task = create(&app, Some(ADA), json!({ "title": "Old" })).await;
    let id = task["id"].as_str().unwrap();

    let json = say(&app, "conv-d", ADA, &format!("delete task [{id}]")).await;
    assert_eq!(json["reply"], "Deleted.");

    let json = say(&app, "conv-d2", ADA, &format!("delete task [{id}]")).await;
    assert_eq!(json["reply"], "Task not found");
}

#[tokio::test]
async fn test_agent_cannot_touch_other_owners_tasks() {
    let (_, app) = make_app();
    let task = create(&app, Some(ADA), json!({ "title": "Ada's" })).await;
    let id = task["id"].as_str().unwrap();

    let json = say(&app, "conv-x", BOB, &format!("delete task [{id}]")).await;
    assert_eq!(json["reply"], "Task not found");
    let (status, _) = send(&app, get(&format!("/api/tasks/{id}"), Some(ADA))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_agent_list_with_no_tasks() {
    let (_, app) = make_app();
    let json = say(&app, "conv-e", ADA, "list tasks").await;
    assert_eq!(json["reply"], "No tasks found.");
}

#[tokio::test]
async fn test_agent_requires_conversation_id() {
    let (_, app) = make_app();
    let (status, json) = send(
        &app,
        with_json("POST", "/api/agent/messages", Some(ADA), json!({ "message": "list tasks" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "conversationId is required");
}

#[tokio::test]
async fn test_agent_rejects_blank_message() {
    let (_, app) = make_app();
    let (status, json) = send(
        &app,
        with_json(
            "POST",
            "/api/agent/messages",
            Some(ADA),
            json!({ "conversationId": "c1", "message": "   " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_agent_numeric_conversation_id() {
    let (_, app) = make_app();
    let (status, json) = send(
        &app,
        with_json(
            "POST",
            "/api/agent/messages",
            Some(ADA),
            json!({ "conversationId": 42, "message": "list tasks" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["conversationId"], "42");
}

#[tokio::test]
async fn test_conversation_transcript() {
    let (_, app) = make_app();
    say(&app, "conv-t", ADA, "list tasks").await;

    let (status, json) = send(
        &app,
        get("/api/agent/conversations/conv-t/messages", Some(ADA)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["conversationId"], "conv-t");
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["content"], "No tasks found.");

    let (_, json) = send(
        &app,
        get("/api/agent/conversations/conv-t/messages", Some(BOB)),
    )
    .await;
    assert!(json["messages"].as_array().unwrap().is_empty());
}

// =============================================================================
// Tool calls
// =============================================================================

#[tokio::test]
async fn test_tool_definitions() {
    let (_, app) = make_app();
    let (status, json) = send(&app, get("/api/agent/tools", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tools"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_tool_call_create_and_list() {
    let (_, app) = make_app();
    let body = json!({
        "name": "createTask",
        "arguments": { "title": "Via tool", "priority": "low", "owner": "mallory@example.com" }
    });
    let (status, json) = send(&app, with_json("POST", "/api/agent/tools/call", Some(ADA), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["task"]["owner"], ADA);

    let body = json!({ "name": "listTasks", "arguments": {} });
    let (_, json) = send(&app, with_json("POST", "/api/agent/tools/call", Some(ADA), body)).await;
    assert_eq!(json["tasks"][0]["title"], "Via tool");
}

#[tokio::test]
async fn test_tool_call_failures_are_in_body() {
    let (_, app) = make_app();
    let body = json!({ "name": "deleteTask", "arguments": {} });
    let (status, json) = send(&app, with_json("POST", "/api/agent/tools/call", Some(ADA), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "id or title required");

    let body = json!({ "name": "archiveTask" });
    let (_, json) = send(&app, with_json("POST", "/api/agent/tools/call", Some(ADA), body)).await;
    assert_eq!(json["message"], "Unknown tool: archiveTask");
}

#[tokio::test]
async fn test_tool_call_requires_name() {
    let (_, app) = make_app();
    let (status, json) = send(
        &app,
        with_json("POST", "/api/agent/tools/call", Some(ADA), json!({ "arguments": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "name is required");
}
