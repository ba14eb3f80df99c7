//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use taskfast_agent::{
    InMemorySessionStore, Orchestrator, RepositoryTools, RuleExtractor, TaskTools,
    TranscriptStore,
};
use taskfast_core::config::TaskfastConfig;
use taskfast_storage::{Database, TaskRepository};
use tracing::warn;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TaskfastConfig>,
    pub repo: Arc<TaskRepository>,
    /// Task tools shared by the orchestrator and the direct tool endpoint.
    pub tools: Arc<dyn TaskTools>,
    pub orchestrator: Arc<Orchestrator>,
    /// Kept for the expiry sweeper.
    pub sessions: Arc<InMemorySessionStore>,
    pub transcripts: Arc<TranscriptStore>,
    /// Broadcast sender for SSE task events.
    pub event_tx: tokio::sync::broadcast::Sender<serde_json::Value>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the repository, agent and event channel over `database`.
    pub fn new(config: TaskfastConfig, database: Arc<Database>) -> Self {
        let agent = config.agent.clone();
        let repo = Arc::new(TaskRepository::new(database));
        let tools: Arc<dyn TaskTools> = Arc::new(RepositoryTools::new(repo.clone()));
        let sessions = Arc::new(InMemorySessionStore::new(
            agent.session_ttl_minutes,
            agent.max_sessions,
        ));
        let transcripts = Arc::new(TranscriptStore::new(agent.transcript_turns));
        let orchestrator = Arc::new(Orchestrator::new(
            agent,
            Arc::new(RuleExtractor::new()),
            sessions.clone(),
            tools.clone(),
            transcripts.clone(),
        ));

        let (event_tx, _) = tokio::sync::broadcast::channel(256);
        Self {
            config: Arc::new(config),
            repo,
            tools,
            orchestrator,
            sessions,
            transcripts,
            event_tx,
            start_time: Instant::now(),
        }
    }

    /// Drops expired conversations and their transcripts.
    pub fn sweep_expired(&self) -> usize {
        let ttl_minutes = self.config.agent.session_ttl_minutes;
        if ttl_minutes == 0 {
            return 0;
        }
        let sessions = self.sessions.purge_expired().unwrap_or_else(|e| {
            warn!(error = %e, "session sweep failed");
            0
        });
        let transcripts = self
            .transcripts
            .purge_idle(chrono::Duration::minutes(i64::from(ttl_minutes)))
            .unwrap_or_else(|e| {
                warn!(error = %e, "transcript sweep failed");
                0
            });
        sessions + transcripts
    }
}
