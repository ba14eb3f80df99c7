//! Reply text for completed turns.

use taskfast_core::types::Task;

use crate::tools::ToolResult;
use crate::types::Intent;

/// Sent when no intent has been recognized in the conversation.
pub const GUIDANCE: &str =
    "I can help with tasks. Try: 'add task', 'update task', 'delete task', or 'list tasks'.";

pub const NO_TASKS: &str = "No tasks found.";

// =============================================================================
// ResponseGenerator
// =============================================================================

/// Composes the reply for a dispatched tool result.
pub struct ResponseGenerator {
    /// Maximum number of tasks shown in a list reply.
    pub list_limit: usize,
}

impl ResponseGenerator {
    pub fn new(list_limit: usize) -> Self {
        Self { list_limit }
    }

    pub fn render(&self, intent: Intent, result: &ToolResult) -> String {
        if !result.success {
            return result.failure_message().to_string();
        }
        match intent {
            Intent::AddTask => format!("Added: {}", title_of(result)),
            Intent::UpdateTask => format!("Updated: {}", title_of(result)),
            Intent::DeleteTask => "Deleted.".to_string(),
            Intent::ListTasks => self.render_list(result.tasks.as_deref().unwrap_or_default()),
        }
    }

    fn render_list(&self, tasks: &[Task]) -> String {
        if tasks.is_empty() {
            return NO_TASKS.to_string();
        }
        tasks
            .iter()
            .take(self.list_limit)
            .map(list_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn title_of(result: &ToolResult) -> &str {
    result.task.as_ref().map_or("", |t| t.title.as_str())
}

/// `• {title} ({priority}) - {date|no date} [{id}]`
fn list_line(task: &Task) -> String {
    let date = task
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "no date".to_string());
    format!("• {} ({}) - {} [{}]", task.title, task.priority, date, task.id)
}
