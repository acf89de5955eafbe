//! Transcript entry types.
//!
//! An entry is addressed by its producer-assigned `timestamp`. The `text`
//! payload is opaque here: category-specific parsing (JSON tool descriptions,
//! command strings, question options) happens in the consumers.

use serde::{Deserialize, Serialize};

/// Whether an entry needs a response before the agent can proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// The agent is blocked until an approve / reject / answer is sent.
    ActionRequest,
    /// Informational only.
    Notification,
}

/// Discriminator for an entry's payload.
///
/// The first group are the categories an action request can carry (and the
/// keys of the approval policy); the second group are notification subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    // -----------------------------------------------------------------------
    // Action categories
    // -----------------------------------------------------------------------
    /// Read a file or list a directory.
    FileRead,
    /// Create or edit a file.
    FileWrite,
    /// Run a shell command. `text` is the command line.
    ShellCommand,
    /// Drive the headless browser.
    BrowserAction,
    /// Call a tool exposed by an external (MCP) server.
    ExternalToolCall,
    /// Switch between planning and acting.
    ModeSwitch,
    /// Start a new sub-task.
    SubTask,
    /// Retry a failed API request.
    RetryPrompt,
    /// A question for the user that expects a free-text answer.
    FreeTextQuestion,
    /// Replace the agent's todo list.
    TodoUpdate,

    // -----------------------------------------------------------------------
    // Notification subtypes
    // -----------------------------------------------------------------------
    /// Assistant prose.
    Text,
    /// Assistant reasoning.
    Reasoning,
    /// API request bookkeeping (tokens, cost).
    ApiRequest,
    /// Output streamed from a running command.
    CommandOutput,
    /// The agent reports the task as complete.
    CompletionResult,
    /// An error surfaced by the agent.
    Error,
    /// Feedback the user typed, echoed back by the agent.
    UserFeedback,
    /// A workspace checkpoint was created.
    Checkpoint,
}

impl Category {
    /// Every category, action categories first.
    pub const ALL: [Category; 18] = [
        Category::FileRead,
        Category::FileWrite,
        Category::ShellCommand,
        Category::BrowserAction,
        Category::ExternalToolCall,
        Category::ModeSwitch,
        Category::SubTask,
        Category::RetryPrompt,
        Category::FreeTextQuestion,
        Category::TodoUpdate,
        Category::Text,
        Category::Reasoning,
        Category::ApiRequest,
        Category::CommandOutput,
        Category::CompletionResult,
        Category::Error,
        Category::UserFeedback,
        Category::Checkpoint,
    ];

    /// Categories that can appear on an action request and be configured in
    /// the approval policy.
    pub const ACTIONS: [Category; 10] = [
        Category::FileRead,
        Category::FileWrite,
        Category::ShellCommand,
        Category::BrowserAction,
        Category::ExternalToolCall,
        Category::ModeSwitch,
        Category::SubTask,
        Category::RetryPrompt,
        Category::FreeTextQuestion,
        Category::TodoUpdate,
    ];

    /// Returns `true` for categories that may carry an action request.
    pub fn is_action(self) -> bool {
        Self::ACTIONS.contains(&self)
    }

    /// Returns `true` when the entry text is a command line that allow and
    /// deny lists are matched against.
    pub fn is_shell_command_like(self) -> bool {
        matches!(self, Category::ShellCommand)
    }

    /// Grace period applied when the policy enables this category without
    /// an explicit delay.
    pub fn default_delay_seconds(self) -> f64 {
        match self {
            Category::RetryPrompt => 5.0,
            Category::FreeTextQuestion => 10.0,
            _ => 0.0,
        }
    }

    /// The snake_case name used in config files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::FileRead => "file_read",
            Category::FileWrite => "file_write",
            Category::ShellCommand => "shell_command",
            Category::BrowserAction => "browser_action",
            Category::ExternalToolCall => "external_tool_call",
            Category::ModeSwitch => "mode_switch",
            Category::SubTask => "sub_task",
            Category::RetryPrompt => "retry_prompt",
            Category::FreeTextQuestion => "free_text_question",
            Category::TodoUpdate => "todo_update",
            Category::Text => "text",
            Category::Reasoning => "reasoning",
            Category::ApiRequest => "api_request",
            Category::CommandOutput => "command_output",
            Category::CompletionResult => "completion_result",
            Category::Error => "error",
            Category::UserFeedback => "user_feedback",
            Category::Checkpoint => "checkpoint",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry as last accepted for its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unique key assigned by the producer; defines ordering.
    #[serde(alias = "ts")]
    pub timestamp: u64,
    pub kind: EntryKind,
    pub category: Category,
    #[serde(default)]
    pub text: String,
    /// `true` while the producer is still streaming this entry.
    #[serde(default)]
    pub partial: bool,
}

impl TranscriptEntry {
    /// Build an action request.
    pub fn action_request(
        timestamp: u64,
        category: Category,
        text: impl Into<String>,
        partial: bool,
    ) -> Self {
        Self {
            timestamp,
            kind: EntryKind::ActionRequest,
            category,
            text: text.into(),
            partial,
        }
    }

    /// Build a notification.
    pub fn notification(
        timestamp: u64,
        category: Category,
        text: impl Into<String>,
        partial: bool,
    ) -> Self {
        Self {
            timestamp,
            kind: EntryKind::Notification,
            category,
            text: text.into(),
            partial,
        }
    }

    pub fn is_action_request(&self) -> bool {
        self.kind == EntryKind::ActionRequest
    }

    /// Length used by the acceptance rule, in Unicode scalar values.
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_deserializes_with_ts_alias() {
        let value = serde_json::json!({
            "ts": 1000,
            "kind": "action_request",
            "category": "shell_command",
            "text": "git status",
            "partial": true
        });
        let entry: TranscriptEntry = serde_json::from_value(value).unwrap();
        assert_eq!(entry.timestamp, 1000);
        assert!(entry.is_action_request());
        assert_eq!(entry.category, Category::ShellCommand);
        assert!(entry.partial);
    }

    #[test]
    fn test_entry_defaults_text_and_partial() {
        let value = serde_json::json!({
            "timestamp": 7,
            "kind": "notification",
            "category": "checkpoint"
        });
        let entry: TranscriptEntry = serde_json::from_value(value).unwrap();
        assert_eq!(entry.text, "");
        assert!(!entry.partial);
    }

    #[test]
    fn test_text_len_counts_chars_not_bytes() {
        let entry = TranscriptEntry::notification(1, Category::Text, "héllo", false);
        assert_eq!(entry.text_len(), 5);
        assert_eq!(entry.text.len(), 6);
    }

    #[test]
    fn test_category_names_round_trip_through_serde() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_default_delays() {
        assert_eq!(Category::RetryPrompt.default_delay_seconds(), 5.0);
        assert_eq!(Category::FreeTextQuestion.default_delay_seconds(), 10.0);
        assert_eq!(Category::FileRead.default_delay_seconds(), 0.0);
        assert!(Category::ShellCommand.is_shell_command_like());
        assert!(!Category::FileWrite.is_shell_command_like());
        assert!(Category::TodoUpdate.is_action());
        assert!(!Category::Text.is_action());
    }
}
