//! Conversational task agent for TaskFast.
//!
//! Turns chat messages into task operations: extracts an intent and task
//! fields from each message, keeps per-conversation dialogue state, asks
//! for whatever is still missing, and dispatches the owner-scoped task
//! tools once an intent is complete.

pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod response;
pub mod session;
pub mod time_parser;
pub mod tool_call;
pub mod tools;
pub mod transcript;
pub mod types;

pub use error::AgentError;
pub use extractor::{RuleExtractor, SlotExtractor};
pub use orchestrator::Orchestrator;
pub use response::ResponseGenerator;
pub use session::{InMemorySessionStore, SessionStore};
pub use tool_call::{dispatch, dispatch_named, tool_definitions, ToolCall};
pub use tools::{DeleteTarget, RepositoryTools, TaskTools, ToolResult};
pub use transcript::TranscriptStore;
pub use types::{
    AgentReply, DialogueState, Extraction, Intent, Role, Session, SlotName, Slots,
    TranscriptMessage,
};
