//! Error types for the conversational agent.

use taskfast_core::error::TaskfastError;

/// Errors from the agent that abort a turn before any dialogue happens.
///
/// Extraction misses are never errors; they surface as follow-up questions
/// or guidance replies.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent is disabled")]
    Disabled,
    #[error("conversationId is required")]
    MissingConversationId,
    #[error("message is required")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session error: {0}")]
    Session(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AgentError {
    /// True for errors caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AgentError::MissingConversationId
                | AgentError::EmptyMessage
                | AgentError::MessageTooLong(_)
        )
    }
}

impl From<TaskfastError> for AgentError {
    fn from(err: TaskfastError) -> Self {
        AgentError::Storage(err.to_string())
    }
}
