//! Bounded chat history per conversation.
//!
//! A transcript belongs to the identity that wrote it. When a different
//! identity speaks in the same conversation the history starts over, and
//! other identities read it as empty.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use taskfast_core::types::Owner;

use crate::error::AgentError;
use crate::types::{Role, TranscriptMessage};

struct Transcript {
    owner: Owner,
    messages: VecDeque<TranscriptMessage>,
    updated_at: DateTime<Utc>,
}

pub struct TranscriptStore {
    transcripts: Mutex<HashMap<String, Transcript>>,
    max_messages: usize,
}

impl TranscriptStore {
    /// Keeps the last `turns` user/assistant exchanges of each conversation.
    pub fn new(turns: usize) -> Self {
        Self {
            transcripts: Mutex::new(HashMap::new()),
            max_messages: turns.max(1) * 2,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Transcript>>, AgentError> {
        self.transcripts
            .lock()
            .map_err(|e| AgentError::Session(format!("lock poisoned: {e}")))
    }

    /// Appends one exchange.
    pub fn record(
        &self,
        conversation_id: &str,
        owner: &Owner,
        user_message: &str,
        reply: &str,
    ) -> Result<(), AgentError> {
        let now = Utc::now();
        let mut transcripts = self.lock()?;
        let transcript = transcripts
            .entry(conversation_id.to_string())
            .or_insert_with(|| Transcript {
                owner: owner.clone(),
                messages: VecDeque::new(),
                updated_at: now,
            });

        if &transcript.owner != owner {
            transcript.owner = owner.clone();
            transcript.messages.clear();
        }

        for (role, content) in [(Role::User, user_message), (Role::Assistant, reply)] {
            transcript.messages.push_back(TranscriptMessage {
                id: Uuid::new_v4(),
                role,
                content: content.to_string(),
                created_at: now,
            });
        }
        while transcript.messages.len() > self.max_messages {
            transcript.messages.pop_front();
        }
        transcript.updated_at = now;
        Ok(())
    }

    /// Oldest-first history, visible only to the transcript's owner.
    pub fn history(
        &self,
        conversation_id: &str,
        owner: &Owner,
    ) -> Result<Vec<TranscriptMessage>, AgentError> {
        let transcripts = self.lock()?;
        Ok(transcripts
            .get(conversation_id)
            .filter(|t| &t.owner == owner)
            .map(|t| t.messages.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Drops transcripts untouched for longer than `max_idle`.
    pub fn purge_idle(&self, max_idle: Duration) -> Result<usize, AgentError> {
        let cutoff = Utc::now() - max_idle;
        let mut transcripts = self.lock()?;
        let before = transcripts.len();
        transcripts.retain(|_, t| t.updated_at >= cutoff);
        Ok(before - transcripts.len())
    }
}
