//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! panic recovery and all endpoint handlers.

use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use taskfast_core::error::TaskfastError;

use crate::error::ApiError;
use crate::handlers;
use crate::identity::IDENTITY_HEADER;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(IDENTITY_HEADER),
        ]);

    let task_routes = Router::new()
        .route("/", get(handlers::list_tasks).post(handlers::create_task))
        // Registered before "/{id}" would match it.
        .route("/stream", get(handlers::stream))
        .route(
            "/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        );

    let agent_routes = Router::new()
        .route("/health", get(handlers::agent_health))
        .route("/messages", post(handlers::agent_message))
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversation_messages),
        )
        .route("/tools", get(handlers::agent_tools))
        .route("/tools/call", post(handlers::call_tool));

    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/tasks", task_routes)
        .nest("/api/agent", agent_routes)
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

fn panic_response(_payload: Box<dyn Any + Send + 'static>) -> Response {
    error!("handler panicked");
    ApiError::Internal("internal server error".to_string()).into_response()
}

/// Bind the configured address and serve until the process exits.
pub async fn start_server(state: AppState) -> Result<(), TaskfastError> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TaskfastError::Config(format!("Failed to bind {addr}: {e}")))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(TaskfastError::Io)?;

    Ok(())
}
