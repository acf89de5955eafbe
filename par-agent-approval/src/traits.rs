//! Seams between the orchestrator and the outside world.
//!
//! The orchestrator never blocks on these: a dispatch is fire-and-forget
//! and its outcome comes back later through
//! [`ApprovalOrchestrator::on_dispatch_settled`](crate::ApprovalOrchestrator::on_dispatch_settled);
//! a timer reports its firing through
//! [`ApprovalOrchestrator::on_timer_fired`](crate::ApprovalOrchestrator::on_timer_fired).

use std::time::Duration;

use crate::response::ApprovalResponse;

/// Sends responses to the agent process.
pub trait ResponseDispatcher: Send {
    /// Start sending `response`. Must not block.
    fn dispatch(&mut self, response: ApprovalResponse);
}

/// Schedules delayed auto-approvals.
pub trait ApprovalTimer: Send {
    /// Arrange for the orchestrator to be told that the timer for
    /// `timestamp` fired after `delay`.
    fn schedule(&mut self, timestamp: u64, delay: Duration) -> Box<dyn TimerHandle>;
}

/// Handle to one scheduled timer.
pub trait TimerHandle: Send {
    /// Stop the timer. Cancelling a fired or already cancelled timer is a
    /// no-op.
    fn cancel(&self);
}
