//! Loosely-typed task fields as they arrive from clients, and their
//! conversion into drafts and patches.
//!
//! Dates and times come in as strings so a blank value can mean "not set"
//! and a clock-only time (`09:30`) can be anchored to the due date sent in
//! the same payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{Result, TaskfastError};
use crate::normalize::{self, TimeInput};
use crate::types::{double_option, CompletionFlag, DueDate, Owner, Priority, TaskDraft, TaskPatch};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_time: Option<Option<String>>,
    pub completed: Option<CompletionFlag>,
}

impl TaskFields {
    /// Builds a creation draft. Blank date/time strings count as absent.
    pub fn into_draft(self, owner: Owner) -> Result<TaskDraft> {
        let due_date = parse_due(flatten(self.due_date))?;
        let anchor = due_date.map(|d| d.date());
        let start_time = parse_time(flatten(self.start_time), anchor)?;
        let end_time = parse_time(flatten(self.end_time), anchor)?;
        normalize::validate_schedule(start_time.as_ref(), end_time.as_ref())?;

        let draft = TaskDraft {
            title: self.title.unwrap_or_default(),
            description: self.description,
            priority: self.priority,
            due_date,
            start_time,
            end_time,
            completed: self.completed.map(|c| c.0),
            owner,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Builds a patch. `null` or a blank string clears a date/time field;
    /// a missing key leaves it alone.
    pub fn into_patch(self) -> Result<TaskPatch> {
        let due_date = match self.due_date {
            None => None,
            Some(raw) => Some(parse_due(blank_to_none(raw))?),
        };
        let anchor = due_date.flatten().map(|d| d.date());
        let start_time = match self.start_time {
            None => None,
            Some(raw) => Some(parse_time(blank_to_none(raw), anchor)?),
        };
        let end_time = match self.end_time {
            None => None,
            Some(raw) => Some(parse_time(blank_to_none(raw), anchor)?),
        };
        if let (Some(start), Some(end)) = (start_time, end_time) {
            normalize::validate_schedule(start.as_ref(), end.as_ref())?;
        }

        let patch = TaskPatch {
            title: self.title,
            description: self.description,
            priority: self.priority,
            due_date,
            start_time,
            end_time,
            completed: self.completed.map(|c| c.0),
        };
        patch.validate()?;
        Ok(patch)
    }
}

fn blank_to_none(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

fn flatten(raw: Option<Option<String>>) -> Option<String> {
    blank_to_none(raw.flatten())
}

fn parse_due(raw: Option<String>) -> Result<Option<DueDate>> {
    raw.map(|s| {
        s.parse::<DueDate>()
            .map_err(|_| TaskfastError::Validation(format!("invalid dueDate: {}", s.trim())))
    })
    .transpose()
}

fn parse_time(raw: Option<String>, anchor: Option<NaiveDate>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| normalize::resolve_time(TimeInput::parse(&s)?, anchor))
        .transpose()
}
