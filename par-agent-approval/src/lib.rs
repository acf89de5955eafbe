//! par-agent-approval: deciding and answering the agent's action requests.
//!
//! The [`ApprovalOrchestrator`] watches the transcript for the latest
//! unanswered action request, runs the policy [`decide`] function once it is
//! complete, and answers it immediately, after a grace period, or not at all
//! (leaving it to the user).
//!
//! - [`decision`] - the pure decision function
//! - [`command_match`] - allow / deny list matching for shell commands
//! - [`orchestrator`] - per-request state machine, timers and dispatch
//! - [`recent`] - bounded set of recently decided timestamps

pub mod command_match;
pub mod decision;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod recent;
pub mod response;
pub mod traits;

pub use decision::{AutoRejectReason, Decision, decide};
pub use error::{ApprovalError, DispatchError};
pub use event::{ApprovalEvent, PendingApproval};
pub use orchestrator::{ApprovalOrchestrator, ApprovalPhase};
pub use recent::RecentTimestamps;
pub use response::{ApprovalResponse, ResponseKind};
pub use traits::{ApprovalTimer, ResponseDispatcher, TimerHandle};
