use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TaskfastError;
use crate::normalize;

// =============================================================================
// Enums
// =============================================================================

/// Task priority. Always stored and reported in lowercase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskfastError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(TaskfastError::Validation(format!(
                "priority must be one of low, medium, high (got '{other}')"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Value types
// =============================================================================

/// A calendar day with no time-of-day.
///
/// Serialized as the UTC-midnight timestamp of that day
/// (`2024-05-01T00:00:00Z`) so clients that expect a datetime can consume it,
/// while the day itself never moves across a boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DueDate(pub NaiveDate);

impl DueDate {
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The UTC-midnight instant of this day.
    pub fn midnight_utc(&self) -> DateTime<Utc> {
        normalize::midnight_utc(self.0)
    }
}

impl From<NaiveDate> for DueDate {
    fn from(date: NaiveDate) -> Self {
        DueDate(date)
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DueDate {
    type Err = TaskfastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize::parse_due_date(s).map(DueDate)
    }
}

impl Serialize for DueDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let instant = self.midnight_utc().format("%Y-%m-%dT%H:%M:%SZ");
        serializer.serialize_str(&instant.to_string())
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity string scoping a task to its creating user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    /// Owner assigned when the caller supplied no identity.
    pub const SENTINEL: &'static str = "temp-user";

    /// Builds an owner from an optional identity, falling back to the
    /// sentinel for missing or blank values.
    pub fn resolve(identity: Option<&str>) -> Self {
        match identity.map(str::trim) {
            Some(id) if !id.is_empty() => Owner(id.to_string()),
            _ => Owner::anonymous(),
        }
    }

    pub fn anonymous() -> Self {
        Owner(Self::SENTINEL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::SENTINEL
    }
}

impl Default for Owner {
    fn default() -> Self {
        Owner::anonymous()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned opaque task identifier (24 lowercase hex characters).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub const LEN: usize = 24;

    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id has the shape the store generates.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.trim().to_lowercase())
    }
}

/// Interprets free-form completion text. `yes`, `true` and `done` anywhere
/// in the value (any case) mean completed; everything else means not.
pub fn completion_flag_from_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["yes", "true", "done"].iter().any(|word| lower.contains(word))
}

/// A completion flag as clients send it: a JSON boolean, or text where
/// `yes`, `true` and `done` mean completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionFlag(pub bool);

impl<'de> Deserialize<'de> for CompletionFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => CompletionFlag(flag),
            Raw::Text(text) => CompletionFlag(completion_flag_from_text(&text)),
        })
    }
}

/// Deserializes a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: a
/// missing key stays `None`, `null` becomes `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Structs
// =============================================================================

/// A persisted task record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<DueDate>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
}

/// Fields for a task about to be created.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DueDate>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub owner: Owner,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, owner: Owner) -> Self {
        Self {
            title: title.into(),
            owner,
            ..Default::default()
        }
    }

    /// Rejects drafts whose title is blank.
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(TaskfastError::Validation("title is required".to_string()));
        }
        Ok(())
    }
}

/// A partial update. `None` leaves a field untouched; for the nullable
/// fields `Some(None)` clears the stored value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DueDate>>,
    pub start_time: Option<Option<DateTime<Utc>>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(TaskfastError::Validation("title cannot be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Applies the present fields to `task`.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(start_time) = self.start_time {
            task.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            task.end_time = end_time;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// Optional equality constraints for listing tasks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskFilters {
    pub owner: Option<Owner>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub limit: Option<usize>,
}

impl TaskFilters {
    pub fn for_owner(owner: Owner) -> Self {
        Self {
            owner: Some(owner),
            ..Default::default()
        }
    }
}
