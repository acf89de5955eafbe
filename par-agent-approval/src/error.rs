//! Error types for the approval crate.

use thiserror::Error;

/// A human response that could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("no action request is awaiting a response")]
    NoPendingApproval,

    #[error("action request {requested} is not pending (pending is {pending})")]
    NotPending { requested: u64, pending: u64 },

    #[error("action request {0} has already been answered")]
    AlreadyAnswered(u64),

    #[error("a response for action request {0} is already being sent")]
    Dispatching(u64),
}

/// Failure reported when a response could not be delivered to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The send was cancelled before completing.
    #[error("dispatch cancelled")]
    Cancelled,

    /// The task performing the send was aborted.
    #[error("dispatch task aborted")]
    TaskAborted,

    /// The agent connection is gone.
    #[error("response channel closed")]
    ChannelClosed,

    #[error("transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    /// `true` for failures caused by the send being cancelled rather than
    /// by the transport.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DispatchError::Cancelled | DispatchError::TaskAborted)
    }
}
