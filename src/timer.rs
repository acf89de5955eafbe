//! Delayed auto-approval timers on tokio.

use std::time::Duration;

use par_agent_approval::{ApprovalTimer, TimerHandle};
use tokio::task::AbortHandle;

use crate::runtime::SessionSender;
use crate::session::SessionEvent;

/// Sleeps on a tokio task and posts [`SessionEvent::ApprovalTimerFired`]
/// back to the session. Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioApprovalTimer {
    events: SessionSender,
}

impl TokioApprovalTimer {
    pub fn new(events: SessionSender) -> Self {
        Self { events }
    }
}

impl ApprovalTimer for TokioApprovalTimer {
    fn schedule(&mut self, timestamp: u64, delay: Duration) -> Box<dyn TimerHandle> {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::debug!("Timer: grace period for {timestamp} elapsed");
            if !events.send(SessionEvent::ApprovalTimerFired(timestamp)) {
                log::debug!("Timer: session gone before {timestamp} fired");
            }
        });
        Box::new(TokioTimerHandle(task.abort_handle()))
    }
}

/// Aborts the sleeping task. Aborting a finished task is a no-op.
#[derive(Debug)]
pub struct TokioTimerHandle(AbortHandle);

impl TimerHandle for TokioTimerHandle {
    fn cancel(&self) {
        self.0.abort();
    }
}
