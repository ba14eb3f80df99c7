use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use taskfast_core::types::{DueDate, Owner, Priority};

use crate::tools::ToolResult;

// =============================================================================
// Intent
// =============================================================================

/// The classified goal of a conversational turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddTask,
    UpdateTask,
    DeleteTask,
    ListTasks,
}

impl Intent {
    /// Slots that must be filled before the intent's tool runs, in the
    /// order they are asked for.
    pub fn required_slots(&self) -> &'static [SlotName] {
        match self {
            Intent::AddTask => &[SlotName::Title],
            Intent::UpdateTask => &[SlotName::Id],
            Intent::DeleteTask => &[SlotName::Id],
            Intent::ListTasks => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AddTask => "add_task",
            Intent::UpdateTask => "update_task",
            Intent::DeleteTask => "delete_task",
            Intent::ListTasks => "list_tasks",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_task" => Ok(Intent::AddTask),
            "update_task" => Ok(Intent::UpdateTask),
            "delete_task" => Ok(Intent::DeleteTask),
            "list_tasks" => Ok(Intent::ListTasks),
            other => Err(format!("unknown intent: {other}")),
        }
    }
}

// =============================================================================
// Slots
// =============================================================================

/// Names of the fields a conversation can collect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotName {
    Title,
    Id,
    Priority,
    DueDate,
    StartTime,
    EndTime,
    Completed,
    Owner,
}

impl SlotName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Title => "title",
            SlotName::Id => "id",
            SlotName::Priority => "priority",
            SlotName::DueDate => "dueDate",
            SlotName::StartTime => "startTime",
            SlotName::EndTime => "endTime",
            SlotName::Completed => "completed",
            SlotName::Owner => "owner",
        }
    }

    /// The question asked when this slot is missing.
    pub fn prompt(&self) -> String {
        match self {
            SlotName::Title => "What is the task title?".to_string(),
            SlotName::Id => "Which task should I target? Send the task ID.".to_string(),
            SlotName::DueDate => "What date? (YYYY-MM-DD)".to_string(),
            SlotName::StartTime => "Start time? (e.g., 09:30)".to_string(),
            SlotName::EndTime => "End time? (e.g., 10:30)".to_string(),
            SlotName::Priority => "Priority? (low/medium/high)".to_string(),
            SlotName::Completed => "Is it completed? (yes/no)".to_string(),
            SlotName::Owner => format!("Please provide {}.", self.as_str()),
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured fields accumulated across the turns of one conversation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DueDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

impl Slots {
    /// Overwrites each field that is present in `other`.
    pub fn merge(&mut self, other: Slots) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.id.is_some() {
            self.id = other.id;
        }
        if other.priority.is_some() {
            self.priority = other.priority;
        }
        if other.due_date.is_some() {
            self.due_date = other.due_date;
        }
        if other.start_time.is_some() {
            self.start_time = other.start_time;
        }
        if other.end_time.is_some() {
            self.end_time = other.end_time;
        }
        if other.completed.is_some() {
            self.completed = other.completed;
        }
        if other.owner.is_some() {
            self.owner = other.owner;
        }
    }

    /// A slot counts as filled when present and, for text, non-blank.
    pub fn has(&self, slot: SlotName) -> bool {
        let filled_text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        match slot {
            SlotName::Title => filled_text(&self.title),
            SlotName::Id => filled_text(&self.id),
            SlotName::Priority => self.priority.is_some(),
            SlotName::DueDate => self.due_date.is_some(),
            SlotName::StartTime => self.start_time.is_some(),
            SlotName::EndTime => self.end_time.is_some(),
            SlotName::Completed => self.completed.is_some(),
            SlotName::Owner => self.owner.is_some(),
        }
    }

    /// First required slot of `intent` that is not filled.
    pub fn first_missing(&self, intent: Intent) -> Option<SlotName> {
        intent
            .required_slots()
            .iter()
            .copied()
            .find(|slot| !self.has(*slot))
    }

    pub fn is_empty(&self) -> bool {
        self == &Slots::default()
    }

    pub fn clear(&mut self) {
        *self = Slots::default();
    }
}

/// Output of one extraction pass over an utterance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    pub intent: Option<Intent>,
    pub slots: Slots,
    /// A bare `HH:MM` found with no date to anchor it. Combined with a due
    /// date collected on an earlier turn, if any.
    pub loose_clock: Option<NaiveTime>,
}

// =============================================================================
// Session
// =============================================================================

/// Where the dialogue stands between turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "slot", rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    AwaitingIntent,
    AwaitingSlot(SlotName),
}

impl DialogueState {
    pub fn pending_slot(&self) -> Option<SlotName> {
        match self {
            DialogueState::AwaitingIntent => None,
            DialogueState::AwaitingSlot(slot) => Some(*slot),
        }
    }
}

/// Per-conversation dialogue state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub conversation_id: String,
    pub intent: Option<Intent>,
    pub slots: Slots,
    pub state: DialogueState,
    pub last_tool_result: Option<ToolResult>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            intent: None,
            slots: Slots::default(),
            state: DialogueState::AwaitingIntent,
            last_tool_result: None,
            updated_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Result of one handled message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    pub reply: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_slot: Option<SlotName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

// =============================================================================
// Transcript
// =============================================================================

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One stored chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    pub id: uuid::Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
