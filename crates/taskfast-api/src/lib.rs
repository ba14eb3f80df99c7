//! TaskFast API crate - axum HTTP server, route handlers, SSE streaming.
//!
//! Serves the task REST API, the live task event stream and the
//! conversational agent endpoints.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
