//! Intent and slot extraction from a single utterance.
//!
//! Classifies the utterance into one of the task intents and pulls out
//! whatever task fields it mentions. Nothing here fails: an utterance with
//! no recognizable content yields an empty [`Extraction`].

use std::sync::LazyLock;

use chrono::{Duration, NaiveDateTime, Utc};
use regex::Regex;
use tracing::warn;

use taskfast_core::normalize::{self, combine_utc};
use taskfast_core::types::{DueDate, Priority};

use crate::time_parser::{find_bare_clock, parse_when};
use crate::types::{Extraction, Intent, SlotName, Slots};

/// Turns free text into intent and slot values.
pub trait SlotExtractor: Send + Sync {
    /// Extracts everything recognizable from an utterance.
    fn extract(&self, text: &str) -> Extraction;

    /// Reads an answer to a pending question. Only the asked-for slot is
    /// returned; the raw text stands in when extraction finds nothing.
    fn answer(&self, slot: SlotName, text: &str, current: &Slots) -> Slots;
}

// =============================================================================
// Compiled patterns
// =============================================================================

struct IntentPatterns {
    add: Regex,
    update: Regex,
    delete: Regex,
    list: Regex,
}

// Checked in declaration order; the first match wins.
static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| IntentPatterns {
    add: Regex::new(r"\b(add|create|new)\b.*\btask\b").unwrap(),
    update: Regex::new(r"\b(update|edit|change)\b.*\btask\b").unwrap(),
    delete: Regex::new(r"\b(delete|remove)\b.*\btask\b").unwrap(),
    list: Regex::new(r"\b(list|show)\b.*\btasks\b").unwrap(),
});

static QUOTED_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).unwrap());

static NAMED_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:called|named)\s+([\w\s-]{3,})").unwrap());

static PRIORITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(high|medium|low)\b\s*priority").unwrap());

static COMPLETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bcompleted\b|\bdone\b").unwrap());

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(id)\s*[:#]?\s*([a-f0-9]{8,24})").unwrap());

static BRACKETED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[([a-f0-9]{8,24})\]").unwrap());

static YES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^y(es)?$").unwrap());

// =============================================================================
// RuleExtractor
// =============================================================================

/// Pattern-based extractor.
///
/// Relative dates resolve against the current UTC time unless a fixed
/// reference is set with [`RuleExtractor::with_reference`].
#[derive(Clone, Debug, Default)]
pub struct RuleExtractor {
    reference: Option<NaiveDateTime>,
}

impl RuleExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins "now" for relative expressions.
    pub fn with_reference(now: NaiveDateTime) -> Self {
        Self {
            reference: Some(now),
        }
    }

    fn now(&self) -> NaiveDateTime {
        self.reference.unwrap_or_else(|| Utc::now().naive_utc())
    }

    pub fn extract_at(&self, text: &str, now: NaiveDateTime) -> Extraction {
        let lower = text.to_lowercase();
        let mut slots = Slots {
            title: extract_title(text),
            id: extract_id(text),
            priority: PRIORITY_RE
                .captures(&lower)
                .and_then(|caps| caps[1].parse::<Priority>().ok()),
            completed: COMPLETED_RE.is_match(&lower).then_some(true),
            ..Default::default()
        };

        match parse_when(text, now) {
            Some(when) if when.has_time() => {
                let day = when.date.unwrap_or(now.date());
                let start = when.start.map(|clock| combine_utc(day, clock));
                let mut end = when.end.map(|clock| combine_utc(day, clock));
                // "11pm-1am" ends on the following day.
                if let (Some(start), Some(end_at)) = (start, end) {
                    if end_at <= start {
                        end = Some(end_at + Duration::days(1));
                    }
                }
                slots.start_time = start;
                slots.end_time = end;
            }
            Some(when) => slots.due_date = when.date.map(DueDate),
            None => {}
        }

        let mut loose_clock = None;
        if slots.start_time.is_none() {
            if let Some(clock) = find_bare_clock(text) {
                match slots.due_date {
                    Some(due) => slots.start_time = Some(combine_utc(due.date(), clock)),
                    None => loose_clock = Some(clock),
                }
            }
        }

        Extraction {
            intent: classify(&lower),
            slots,
            loose_clock,
        }
    }

    pub fn answer_at(
        &self,
        slot: SlotName,
        text: &str,
        current: &Slots,
        now: NaiveDateTime,
    ) -> Slots {
        let raw = text.trim();
        let found = self.extract_at(text, now).slots;
        let mut out = Slots::default();

        match slot {
            SlotName::Title => out.title = found.title.or_else(|| non_blank(raw)),
            SlotName::Id => out.id = found.id.or_else(|| non_blank(raw).map(|s| s.to_lowercase())),
            SlotName::Priority => {
                out.priority = found.priority.or_else(|| raw.parse::<Priority>().ok());
                if out.priority.is_none() {
                    warn!(answer = raw, "unrecognized priority answer");
                }
            }
            SlotName::Completed => {
                out.completed = Some(found.completed.unwrap_or_else(|| YES_RE.is_match(raw)));
            }
            SlotName::DueDate => {
                out.due_date = found
                    .due_date
                    .or_else(|| parse_when(text, now).and_then(|when| when.date.map(DueDate)))
                    .or_else(|| normalize::parse_due_date(raw).ok().map(DueDate));
            }
            SlotName::StartTime | SlotName::EndTime => {
                let anchor = current.due_date.map(|d| d.date()).unwrap_or(now.date());
                let value = found
                    .start_time
                    .or_else(|| {
                        normalize::parse_clock(raw)
                            .ok()
                            .map(|clock| combine_utc(anchor, clock))
                    })
                    .or_else(|| normalize::parse_datetime(raw).ok());
                if slot == SlotName::StartTime {
                    out.start_time = value;
                } else {
                    out.end_time = value;
                }
            }
            // Owner comes from the caller's identity, never from text.
            SlotName::Owner => {}
        }
        out
    }
}

impl SlotExtractor for RuleExtractor {
    fn extract(&self, text: &str) -> Extraction {
        self.extract_at(text, self.now())
    }

    fn answer(&self, slot: SlotName, text: &str, current: &Slots) -> Slots {
        self.answer_at(slot, text, current, self.now())
    }
}

fn classify(lower: &str) -> Option<Intent> {
    let patterns = &*INTENT_PATTERNS;
    [
        (&patterns.add, Intent::AddTask),
        (&patterns.update, Intent::UpdateTask),
        (&patterns.delete, Intent::DeleteTask),
        (&patterns.list, Intent::ListTasks),
    ]
    .into_iter()
    .find(|(re, _)| re.is_match(lower))
    .map(|(_, intent)| intent)
}

/// A quoted substring is taken verbatim; otherwise the words after
/// "called"/"named", trimmed.
fn extract_title(text: &str) -> Option<String> {
    if let Some(caps) = QUOTED_TITLE_RE.captures(text) {
        return caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
    }
    NAMED_TITLE_RE
        .captures(text)
        .and_then(|caps| non_blank(caps[1].trim()))
}

fn extract_id(text: &str) -> Option<String> {
    ID_RE
        .captures(text)
        .map(|caps| caps[2].to_lowercase())
        .or_else(|| {
            BRACKETED_ID_RE
                .captures(text)
                .map(|caps| caps[1].to_lowercase())
        })
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
