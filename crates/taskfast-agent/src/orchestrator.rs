//! Dialogue orchestrator: runs one conversational turn.
//!
//! A turn loads the conversation's session, folds the message into its
//! intent and slots, and then either asks for the next missing slot or
//! dispatches the intent's tool and reports the outcome. The session is
//! saved on every path.

use std::sync::Arc;

use tracing::{debug, info};

use taskfast_core::config::AgentConfig;
use taskfast_core::normalize::combine_utc;
use taskfast_core::types::{Owner, TaskDraft, TaskId, TaskPatch};

use crate::error::AgentError;
use crate::extractor::SlotExtractor;
use crate::response::{ResponseGenerator, GUIDANCE};
use crate::session::SessionStore;
use crate::tool_call::{dispatch, ToolCall};
use crate::tools::TaskTools;
use crate::transcript::TranscriptStore;
use crate::types::{AgentReply, DialogueState, Intent, Session, Slots, TranscriptMessage};

/// Coordinates extraction, session state, tool dispatch and replies.
pub struct Orchestrator {
    extractor: Arc<dyn SlotExtractor>,
    sessions: Arc<dyn SessionStore>,
    tools: Arc<dyn TaskTools>,
    transcripts: Arc<TranscriptStore>,
    responses: ResponseGenerator,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        config: AgentConfig,
        extractor: Arc<dyn SlotExtractor>,
        sessions: Arc<dyn SessionStore>,
        tools: Arc<dyn TaskTools>,
        transcripts: Arc<TranscriptStore>,
    ) -> Self {
        Self {
            responses: ResponseGenerator::new(config.list_preview_limit),
            extractor,
            sessions,
            tools,
            transcripts,
            config,
        }
    }

    /// Handle one message from `owner` in `conversation_id`.
    pub async fn handle_message(
        &self,
        conversation_id: &str,
        message: &str,
        owner: &Owner,
    ) -> Result<AgentReply, AgentError> {
        if !self.config.enabled {
            return Err(AgentError::Disabled);
        }
        let conversation_id = conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(AgentError::MissingConversationId);
        }
        if message.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(AgentError::MessageTooLong(self.config.max_message_length));
        }

        let mut session = self
            .sessions
            .get(conversation_id)
            .await?
            .unwrap_or_else(|| Session::new(conversation_id));

        self.absorb(&mut session, message);
        session.slots.owner = Some(owner.clone());

        let reply = self.advance(&mut session, owner).await;
        self.sessions.save(session).await?;
        self.transcripts
            .record(conversation_id, owner, message, &reply.reply)?;
        Ok(reply)
    }

    /// Oldest-first transcript of a conversation, as seen by `owner`.
    pub fn history(
        &self,
        conversation_id: &str,
        owner: &Owner,
    ) -> Result<Vec<TranscriptMessage>, AgentError> {
        self.transcripts.history(conversation_id, owner)
    }

    /// Folds the message into the session's intent and slots.
    fn absorb(&self, session: &mut Session, message: &str) {
        match session.state {
            DialogueState::AwaitingSlot(slot) => {
                let answer = self.extractor.answer(slot, message, &session.slots);
                debug!(
                    conversation_id = %session.conversation_id,
                    slot = %slot,
                    filled = !answer.is_empty(),
                    "pending slot answered"
                );
                session.slots.merge(answer);
                session.state = DialogueState::AwaitingIntent;
            }
            DialogueState::AwaitingIntent => {
                let extraction = self.extractor.extract(message);
                if extraction.intent.is_some() {
                    session.intent = extraction.intent;
                }
                session.slots.merge(extraction.slots);
                if let (Some(clock), None, Some(due)) = (
                    extraction.loose_clock,
                    session.slots.start_time,
                    session.slots.due_date,
                ) {
                    session.slots.start_time = Some(combine_utc(due.date(), clock));
                }
            }
        }
    }

    /// Asks for the next missing slot or runs the intent's tool.
    async fn advance(&self, session: &mut Session, owner: &Owner) -> AgentReply {
        let conversation_id = session.conversation_id.clone();
        let Some(intent) = session.intent else {
            return AgentReply {
                reply: GUIDANCE.to_string(),
                conversation_id,
                intent: None,
                pending_slot: None,
                tool_result: None,
            };
        };

        if let Some(slot) = session.slots.first_missing(intent) {
            session.state = DialogueState::AwaitingSlot(slot);
            debug!(conversation_id = %conversation_id, %intent, slot = %slot, "asking for slot");
            return AgentReply {
                reply: slot.prompt(),
                conversation_id,
                intent: Some(intent),
                pending_slot: Some(slot),
                tool_result: None,
            };
        }

        let call = tool_call_for(intent, &session.slots);
        let result = dispatch(self.tools.as_ref(), call, owner).await;
        info!(
            conversation_id = %conversation_id,
            %intent,
            success = result.success,
            "tool dispatched"
        );

        session.state = DialogueState::AwaitingIntent;
        session.slots.clear();
        session.last_tool_result = Some(result.clone());

        AgentReply {
            reply: self.responses.render(intent, &result),
            conversation_id,
            intent: Some(intent),
            pending_slot: None,
            tool_result: Some(result),
        }
    }
}

/// Maps a fully-slotted intent onto its tool.
fn tool_call_for(intent: Intent, slots: &Slots) -> ToolCall {
    match intent {
        Intent::AddTask => ToolCall::CreateTask(TaskDraft {
            title: slots.title.clone().unwrap_or_default(),
            description: None,
            priority: slots.priority,
            due_date: slots.due_date,
            start_time: slots.start_time,
            end_time: slots.end_time,
            completed: None,
            owner: slots.owner.clone().unwrap_or_default(),
        }),
        Intent::UpdateTask => ToolCall::UpdateTask {
            id: TaskId::from(slots.id.as_deref().unwrap_or_default()),
            patch: TaskPatch {
                title: slots.title.clone(),
                description: None,
                priority: slots.priority,
                due_date: slots.due_date.map(Some),
                start_time: slots.start_time.map(Some),
                end_time: slots.end_time.map(Some),
                completed: slots.completed,
            },
        },
        Intent::DeleteTask => ToolCall::DeleteTask {
            id: slots.id.clone(),
            title: slots.title.clone(),
        },
        Intent::ListTasks => ToolCall::ListTasks {
            priority: slots.priority,
            completed: slots.completed,
        },
    }
}
