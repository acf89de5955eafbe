//! Notifications from the orchestrator to the rendering layer.

use std::time::Duration;

use par_agent_transcript::{Category, TranscriptEntry};

use crate::decision::AutoRejectReason;
use crate::response::ApprovalResponse;

/// The action request currently awaiting a response, as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub timestamp: u64,
    pub category: Category,
    pub text: String,
    pub partial: bool,
}

impl From<&TranscriptEntry> for PendingApproval {
    fn from(entry: &TranscriptEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            category: entry.category,
            text: entry.text.clone(),
            partial: entry.partial,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalEvent {
    /// The displayed pending action changed (new request, completion, text
    /// change) or went away.
    PendingChanged(Option<PendingApproval>),
    /// Policy says ask; waiting for [`respond`](crate::ApprovalOrchestrator::respond).
    AwaitingUser { timestamp: u64, category: Category },
    /// An auto-approval was sent.
    AutoApproved { timestamp: u64, category: Category },
    AutoRejected {
        timestamp: u64,
        reason: AutoRejectReason,
    },
    /// An auto-approval will be sent after `delay` unless superseded.
    Scheduled { timestamp: u64, delay: Duration },
    TimerCancelled { timestamp: u64 },
    /// A response was handed to the dispatcher.
    Dispatched(ApprovalResponse),
    DispatchFailed {
        response: ApprovalResponse,
        error: String,
    },
}
