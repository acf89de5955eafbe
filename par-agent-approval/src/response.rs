//! Responses sent back to the agent for an action request.

use serde::{Deserialize, Serialize};

/// What the response tells the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Approve,
    Reject,
    /// Free-text answer to a question.
    Answer,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResponseKind::Approve => "approve",
            ResponseKind::Reject => "reject",
            ResponseKind::Answer => "answer",
        })
    }
}

/// One response, addressed to the action request at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub timestamp: u64,
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ApprovalResponse {
    pub fn new(timestamp: u64, kind: ResponseKind, text: Option<String>) -> Self {
        Self {
            timestamp,
            kind,
            text,
        }
    }

    pub fn approve(timestamp: u64) -> Self {
        Self::new(timestamp, ResponseKind::Approve, None)
    }

    pub fn reject(timestamp: u64) -> Self {
        Self::new(timestamp, ResponseKind::Reject, None)
    }

    pub fn answer(timestamp: u64, text: impl Into<String>) -> Self {
        Self::new(timestamp, ResponseKind::Answer, Some(text.into()))
    }
}
