//! Approval orchestrator.
//!
//! Runs after every store commit on the session's single writer. Each
//! action request moves through `Observed -> Decided -> Dispatched`, or is
//! `Cleared` when it stops being the pending request. The orchestrator never
//! writes to the store; it answers the agent through a [`ResponseDispatcher`]
//! and reports what it did on an [`ApprovalEvent`] channel.

use std::collections::BTreeMap;

use par_agent_config::{ModeFlags, PolicyHandle};
use par_agent_transcript::{Category, MessageStore, TranscriptEntry};
use tokio::sync::mpsc;

use crate::decision::{Decision, decide};
use crate::error::{ApprovalError, DispatchError};
use crate::event::{ApprovalEvent, PendingApproval};
use crate::recent::RecentTimestamps;
use crate::response::{ApprovalResponse, ResponseKind};
use crate::traits::{ApprovalTimer, ResponseDispatcher, TimerHandle};

/// Where the most recent pending request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalPhase {
    /// No action request has been seen yet.
    #[default]
    Idle,
    /// Shown, not decided (still streaming, or just arrived).
    Observed(u64),
    /// Decided; waiting for the user or for a delay timer.
    Decided(u64),
    /// A response was sent.
    Dispatched(u64),
    /// Stopped being pending without a response from this client.
    Cleared(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchOrigin {
    User,
    AutoApprove,
    AutoReject,
}

struct ArmedTimer {
    timestamp: u64,
    category: Category,
    handle: Box<dyn TimerHandle>,
}

pub struct ApprovalOrchestrator {
    policy: PolicyHandle,
    modes: ModeFlags,
    dispatcher: Box<dyn ResponseDispatcher>,
    timer: Box<dyn ApprovalTimer>,
    events: mpsc::UnboundedSender<ApprovalEvent>,

    pending: Option<PendingApproval>,
    phase: ApprovalPhase,
    decided: RecentTimestamps,
    answered: RecentTimestamps,
    armed: Option<ArmedTimer>,
    /// Responses handed to the dispatcher and not yet settled.
    in_flight: BTreeMap<u64, DispatchOrigin>,
    consecutive_auto_approvals: u32,
}

impl std::fmt::Debug for ApprovalOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalOrchestrator")
            .field("pending", &self.pending)
            .field("phase", &self.phase)
            .field("armed", &self.armed.as_ref().map(|a| a.timestamp))
            .field("in_flight", &self.in_flight)
            .field("consecutive_auto_approvals", &self.consecutive_auto_approvals)
            .finish_non_exhaustive()
    }
}

impl ApprovalOrchestrator {
    pub fn new(
        policy: PolicyHandle,
        modes: ModeFlags,
        dispatcher: impl ResponseDispatcher + 'static,
        timer: impl ApprovalTimer + 'static,
        events: mpsc::UnboundedSender<ApprovalEvent>,
    ) -> Self {
        Self {
            policy,
            modes,
            dispatcher: Box::new(dispatcher),
            timer: Box::new(timer),
            events,
            pending: None,
            phase: ApprovalPhase::Idle,
            decided: RecentTimestamps::default(),
            answered: RecentTimestamps::default(),
            armed: None,
            in_flight: BTreeMap::new(),
            consecutive_auto_approvals: 0,
        }
    }

    /// Number of decided and answered timestamps to remember.
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.decided = RecentTimestamps::new(capacity);
        self.answered = RecentTimestamps::new(capacity);
        self
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// Re-evaluate after a store commit.
    pub fn on_store_commit(&mut self, store: &MessageStore) {
        let Some(entry) = store.latest_action_request() else {
            self.clear_pending();
            return;
        };
        let timestamp = entry.timestamp;
        if self.answered.contains(timestamp) {
            self.clear_pending();
            return;
        }

        if self.pending.as_ref().map(|p| p.timestamp) != Some(timestamp) {
            // Superseded: the previous request's timer must not fire.
            self.cancel_timer();
            if let Some(prev) = &self.pending {
                log::debug!("Approval: {} superseded by {timestamp}", prev.timestamp);
            }
            self.phase = ApprovalPhase::Observed(timestamp);
        }

        let shown = PendingApproval::from(entry);
        if self.pending.as_ref() != Some(&shown) {
            self.pending = Some(shown.clone());
            self.emit(ApprovalEvent::PendingChanged(Some(shown)));
        }

        if entry.partial {
            return;
        }
        if !self.decided.insert(timestamp) {
            return;
        }
        self.decide_and_act(entry);
    }

    /// A delay timer fired. Returns `true` if the approval was sent.
    pub fn on_timer_fired(&mut self, timestamp: u64, store: &MessageStore) -> bool {
        let Some(armed) = self.armed.take_if(|a| a.timestamp == timestamp) else {
            log::debug!("Approval: ignoring stale timer for {timestamp}");
            return false;
        };

        let still_pending = store
            .latest_action_request()
            .is_some_and(|e| e.timestamp == timestamp && !e.partial);
        if !still_pending
            || self.answered.contains(timestamp)
            || self.in_flight.contains_key(&timestamp)
        {
            log::debug!("Approval: {timestamp} no longer pending when its timer fired");
            return false;
        }

        // Only policy decisions arm timers, so this counts toward the limit.
        self.auto_approve(timestamp, armed.category, true);
        true
    }

    /// A human response for the pending request.
    pub fn respond(
        &mut self,
        timestamp: u64,
        kind: ResponseKind,
        text: Option<String>,
        store: &MessageStore,
    ) -> Result<(), ApprovalError> {
        if self.in_flight.contains_key(&timestamp) {
            return Err(ApprovalError::Dispatching(timestamp));
        }
        if self.answered.contains(timestamp) {
            return Err(ApprovalError::AlreadyAnswered(timestamp));
        }
        let pending = self
            .pending
            .as_ref()
            .map(|p| p.timestamp)
            .ok_or(ApprovalError::NoPendingApproval)?;
        let latest = store.latest_action_request().map(|e| e.timestamp);
        if pending != timestamp || latest != Some(timestamp) {
            return Err(ApprovalError::NotPending {
                requested: timestamp,
                pending: latest.unwrap_or(pending),
            });
        }

        log::info!("Approval: user {kind} for {timestamp}");
        self.consecutive_auto_approvals = 0;
        self.dispatch(
            ApprovalResponse::new(timestamp, kind, text),
            DispatchOrigin::User,
        );
        Ok(())
    }

    /// The dispatcher finished sending `response`.
    pub fn on_dispatch_settled(
        &mut self,
        response: ApprovalResponse,
        result: Result<(), DispatchError>,
    ) {
        let origin = self.in_flight.remove(&response.timestamp);
        match result {
            Ok(()) => {
                log::debug!(
                    "Approval: {} for {} delivered",
                    response.kind,
                    response.timestamp
                );
            }
            Err(e) if origin == Some(DispatchOrigin::AutoReject) && e.is_cancellation() => {
                log::debug!(
                    "Approval: auto-reject for {} ended by cancellation ({e})",
                    response.timestamp
                );
            }
            Err(e) => {
                log::error!(
                    "Approval: failed to send {} for {}: {e}",
                    response.kind,
                    response.timestamp
                );
                self.emit(ApprovalEvent::DispatchFailed {
                    response,
                    error: e.to_string(),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn pending(&self) -> Option<&PendingApproval> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> ApprovalPhase {
        self.phase
    }

    pub fn is_answered(&self, timestamp: u64) -> bool {
        self.answered.contains(timestamp)
    }

    pub fn is_dispatching(&self, timestamp: u64) -> bool {
        self.in_flight.contains_key(&timestamp)
    }

    /// Responses handed to the dispatcher that have not settled yet.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Timestamp of the request with an armed delay timer, if any.
    pub fn armed_timer(&self) -> Option<u64> {
        self.armed.as_ref().map(|a| a.timestamp)
    }

    pub fn consecutive_auto_approvals(&self) -> u32 {
        self.consecutive_auto_approvals
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn decide_and_act(&mut self, entry: &TranscriptEntry) {
        let timestamp = entry.timestamp;
        let policy = self.policy.snapshot();
        let ci_mode = self.modes.ci_mode();
        let yolo_mode = self.modes.yolo_mode();

        let mut decision = decide(entry, &policy, ci_mode, yolo_mode);
        if matches!(decision, Decision::AutoApprove { .. })
            && !ci_mode
            && !yolo_mode
            && let Some(max) = policy.max_consecutive_auto_approvals
            && self.consecutive_auto_approvals >= max
        {
            log::info!("Approval: {max} auto-approvals in a row, asking about {timestamp}");
            decision = Decision::PresentToUser;
        }

        log::info!(
            "Approval: {} request {timestamp} -> {decision:?}",
            entry.category
        );
        self.phase = ApprovalPhase::Decided(timestamp);

        match decision {
            Decision::AutoApprove { delay } if delay.is_zero() => {
                self.auto_approve(timestamp, entry.category, !ci_mode && !yolo_mode);
            }
            Decision::AutoApprove { delay } => {
                let handle = self.timer.schedule(timestamp, delay);
                self.armed = Some(ArmedTimer {
                    timestamp,
                    category: entry.category,
                    handle,
                });
                self.emit(ApprovalEvent::Scheduled { timestamp, delay });
            }
            Decision::AutoReject { reason } => {
                log::info!("Approval: auto-rejecting {timestamp}: {reason}");
                self.emit(ApprovalEvent::AutoRejected { timestamp, reason });
                self.dispatch(
                    ApprovalResponse::reject(timestamp),
                    DispatchOrigin::AutoReject,
                );
            }
            Decision::PresentToUser => {
                self.emit(ApprovalEvent::AwaitingUser {
                    timestamp,
                    category: entry.category,
                });
            }
        }
    }

    /// `counted` is false for CI and YOLO approvals, which the consecutive
    /// limit does not govern.
    fn auto_approve(&mut self, timestamp: u64, category: Category, counted: bool) {
        if counted {
            self.consecutive_auto_approvals = self.consecutive_auto_approvals.saturating_add(1);
        }
        self.emit(ApprovalEvent::AutoApproved {
            timestamp,
            category,
        });
        self.dispatch(
            ApprovalResponse::approve(timestamp),
            DispatchOrigin::AutoApprove,
        );
    }

    fn dispatch(&mut self, response: ApprovalResponse, origin: DispatchOrigin) {
        let timestamp = response.timestamp;
        if self.in_flight.contains_key(&timestamp) {
            log::warn!("Approval: response for {timestamp} already in flight, dropping duplicate");
            return;
        }
        self.answered.insert(timestamp);
        self.in_flight.insert(timestamp, origin);
        if self.armed_timer() == Some(timestamp) {
            self.cancel_timer();
        }

        self.dispatcher.dispatch(response.clone());
        self.phase = ApprovalPhase::Dispatched(timestamp);
        self.emit(ApprovalEvent::Dispatched(response));

        if self.pending.as_ref().map(|p| p.timestamp) == Some(timestamp) {
            self.clear_pending();
        }
    }

    fn clear_pending(&mut self) {
        self.cancel_timer();
        if let Some(prev) = self.pending.take() {
            if self.phase != ApprovalPhase::Dispatched(prev.timestamp) {
                self.phase = ApprovalPhase::Cleared(prev.timestamp);
            }
            self.emit(ApprovalEvent::PendingChanged(None));
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.handle.cancel();
            log::debug!("Approval: cancelled timer for {}", armed.timestamp);
            self.emit(ApprovalEvent::TimerCancelled {
                timestamp: armed.timestamp,
            });
        }
    }

    fn emit(&self, event: ApprovalEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use par_agent_config::{ApprovalPolicy, CategoryPolicy};
    use parking_lot::Mutex;

    use super::*;
    use crate::decision::AutoRejectReason;

    #[derive(Clone, Default)]
    struct RecordingDispatcher(Arc<Mutex<Vec<ApprovalResponse>>>);

    impl ResponseDispatcher for RecordingDispatcher {
        fn dispatch(&mut self, response: ApprovalResponse) {
            self.0.lock().push(response);
        }
    }

    struct FakeHandle(Arc<AtomicBool>);

    impl TimerHandle for FakeHandle {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct FakeTimer(Arc<Mutex<Vec<(u64, Duration, Arc<AtomicBool>)>>>);

    impl ApprovalTimer for FakeTimer {
        fn schedule(&mut self, timestamp: u64, delay: Duration) -> Box<dyn TimerHandle> {
            let cancelled = Arc::new(AtomicBool::new(false));
            self.0.lock().push((timestamp, delay, Arc::clone(&cancelled)));
            Box::new(FakeHandle(cancelled))
        }
    }

    struct Harness {
        store: MessageStore,
        orch: ApprovalOrchestrator,
        sent: RecordingDispatcher,
        timers: FakeTimer,
        events: mpsc::UnboundedReceiver<ApprovalEvent>,
        policy: PolicyHandle,
        modes: ModeFlags,
    }

    impl Harness {
        fn new(policy: ApprovalPolicy) -> Self {
            let policy = PolicyHandle::new(policy);
            let modes = ModeFlags::default();
            let sent = RecordingDispatcher::default();
            let timers = FakeTimer::default();
            let (tx, events) = mpsc::unbounded_channel();
            let orch = ApprovalOrchestrator::new(
                policy.clone(),
                modes.clone(),
                sent.clone(),
                timers.clone(),
                tx,
            );
            Self {
                store: MessageStore::new(),
                orch,
                sent,
                timers,
                events,
                policy,
                modes,
            }
        }

        fn point(&mut self, entry: TranscriptEntry) {
            if self.store.apply_point_update(entry) {
                self.orch.on_store_commit(&self.store);
            }
        }

        fn snapshot(&mut self, entries: Vec<TranscriptEntry>) {
            if self.store.apply_snapshot(entries) {
                self.orch.on_store_commit(&self.store);
            }
        }

        fn sent(&self) -> Vec<ApprovalResponse> {
            self.sent.0.lock().clone()
        }

        fn drain(&mut self) -> Vec<ApprovalEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn fire(&mut self, timestamp: u64) -> bool {
            self.orch.on_timer_fired(timestamp, &self.store)
        }
    }

    fn req(ts: u64, category: Category, text: &str, partial: bool) -> TranscriptEntry {
        TranscriptEntry::action_request(ts, category, text, partial)
    }

    fn reads_enabled() -> ApprovalPolicy {
        ApprovalPolicy::empty().with(Category::FileRead, CategoryPolicy::enabled())
    }

    #[test]
    fn test_partial_request_is_shown_but_not_decided() {
        let mut h = Harness::new(reads_enabled());
        h.point(req(1000, Category::FileRead, "src/li", true));

        assert_eq!(h.orch.phase(), ApprovalPhase::Observed(1000));
        assert!(h.sent().is_empty());
        assert!(matches!(
            h.drain().as_slice(),
            [ApprovalEvent::PendingChanged(Some(p))] if p.partial
        ));

        h.point(req(1000, Category::FileRead, "src/lib.rs", false));
        assert_eq!(h.sent(), vec![ApprovalResponse::approve(1000)]);
        assert_eq!(h.orch.phase(), ApprovalPhase::Dispatched(1000));
        assert!(h.orch.is_answered(1000));
        assert!(h.orch.pending().is_none());
    }

    #[test]
    fn test_at_most_one_decision_per_timestamp() {
        let mut h = Harness::new(reads_enabled());
        h.point(req(1000, Category::FileRead, "a.txt", false));
        for _ in 0..3 {
            h.orch.on_store_commit(&h.store);
        }
        h.snapshot(vec![req(1000, Category::FileRead, "a.txt", false)]);
        assert_eq!(h.sent().len(), 1);
    }

    #[test]
    fn test_present_to_user_then_respond() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.point(req(1000, Category::FileWrite, "{}", false));
        let events = h.drain();
        assert!(events.contains(&ApprovalEvent::AwaitingUser {
            timestamp: 1000,
            category: Category::FileWrite
        }));
        assert_eq!(h.orch.phase(), ApprovalPhase::Decided(1000));
        assert!(h.sent().is_empty());

        h.orch
            .respond(1000, ResponseKind::Reject, None, &h.store)
            .unwrap();
        assert_eq!(h.sent(), vec![ApprovalResponse::reject(1000)]);

        // Second answer while the first is still being sent.
        assert_eq!(
            h.orch.respond(1000, ResponseKind::Approve, None, &h.store),
            Err(ApprovalError::Dispatching(1000))
        );
        h.orch
            .on_dispatch_settled(ApprovalResponse::reject(1000), Ok(()));
        assert_eq!(
            h.orch.respond(1000, ResponseKind::Approve, None, &h.store),
            Err(ApprovalError::AlreadyAnswered(1000))
        );
        assert_eq!(h.sent().len(), 1);
    }

    #[test]
    fn test_respond_errors() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        assert_eq!(
            h.orch.respond(5, ResponseKind::Approve, None, &h.store),
            Err(ApprovalError::NoPendingApproval)
        );
        h.point(req(1000, Category::FileWrite, "{}", false));
        assert_eq!(
            h.orch.respond(999, ResponseKind::Approve, None, &h.store),
            Err(ApprovalError::NotPending {
                requested: 999,
                pending: 1000
            })
        );
    }

    #[test]
    fn test_answer_carries_text() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.point(req(1000, Category::FreeTextQuestion, "Which branch?", false));
        h.orch
            .respond(1000, ResponseKind::Answer, Some("main".into()), &h.store)
            .unwrap();
        assert_eq!(h.sent(), vec![ApprovalResponse::answer(1000, "main")]);
    }

    #[test]
    fn test_delayed_approval_fires_once() {
        let policy = ApprovalPolicy::empty().with(Category::RetryPrompt, CategoryPolicy::enabled());
        let mut h = Harness::new(policy);
        h.point(req(1000, Category::RetryPrompt, "api error", false));

        assert_eq!(h.orch.armed_timer(), Some(1000));
        assert_eq!(h.timers.0.lock()[0].1, Duration::from_secs(5));
        assert!(h.sent().is_empty());
        assert!(h.drain().contains(&ApprovalEvent::Scheduled {
            timestamp: 1000,
            delay: Duration::from_secs(5)
        }));

        assert!(h.fire(1000));
        assert_eq!(h.sent(), vec![ApprovalResponse::approve(1000)]);
        assert!(!h.fire(1000));
        assert_eq!(h.sent().len(), 1);
    }

    #[test]
    fn test_superseded_request_cancels_timer() {
        let policy = ApprovalPolicy::empty().with(Category::RetryPrompt, CategoryPolicy::enabled());
        let mut h = Harness::new(policy);
        h.point(req(1000, Category::RetryPrompt, "api error", false));
        h.point(req(2000, Category::FileWrite, "{}", false));

        let cancelled = Arc::clone(&h.timers.0.lock()[0].2);
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(h.drain().contains(&ApprovalEvent::TimerCancelled { timestamp: 1000 }));
        assert_eq!(h.orch.pending().map(|p| p.timestamp), Some(2000));

        // A fire that raced the cancellation does nothing.
        assert!(!h.fire(1000));
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_liveness_rechecked_at_fire_time() {
        let policy = ApprovalPolicy::empty().with(Category::RetryPrompt, CategoryPolicy::enabled());
        let mut h = Harness::new(policy);
        h.point(req(1000, Category::RetryPrompt, "api error", false));

        // A newer request lands in the store but the commit has not been
        // observed yet when the timer fires.
        h.store
            .apply_point_update(req(2000, Category::FileWrite, "{}", false));
        assert!(!h.fire(1000));
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_user_response_cancels_grace_period() {
        let policy = ApprovalPolicy::empty().with(
            Category::FreeTextQuestion,
            CategoryPolicy::enabled(),
        );
        let mut h = Harness::new(policy);
        h.point(req(1000, Category::FreeTextQuestion, "Proceed?", false));
        assert_eq!(h.orch.armed_timer(), Some(1000));

        h.orch
            .respond(1000, ResponseKind::Answer, Some("no".into()), &h.store)
            .unwrap();
        assert_eq!(h.orch.armed_timer(), None);
        assert!(h.timers.0.lock()[0].2.load(Ordering::SeqCst));
        assert!(!h.fire(1000));
        assert_eq!(h.sent(), vec![ApprovalResponse::answer(1000, "no")]);
    }

    #[test]
    fn test_ci_mode_rejects_disabled_category() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.modes.set_ci_mode(true);
        h.point(req(1000, Category::BrowserAction, "{}", false));

        assert_eq!(h.sent(), vec![ApprovalResponse::reject(1000)]);
        assert!(h.drain().contains(&ApprovalEvent::AutoRejected {
            timestamp: 1000,
            reason: AutoRejectReason::CategoryDisabled(Category::BrowserAction)
        }));
    }

    #[test]
    fn test_yolo_approves_everything() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.modes.set_yolo_mode(true);
        h.point(req(1000, Category::ShellCommand, "rm -rf /", false));
        assert_eq!(h.sent(), vec![ApprovalResponse::approve(1000)]);
    }

    #[test]
    fn test_cancelled_auto_reject_is_expected() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.modes.set_ci_mode(true);
        h.point(req(1000, Category::FileWrite, "{}", false));
        h.drain();

        h.orch.on_dispatch_settled(
            ApprovalResponse::reject(1000),
            Err(DispatchError::TaskAborted),
        );
        assert!(h.drain().is_empty());
        assert!(!h.orch.is_dispatching(1000));
    }

    #[test]
    fn test_unexpected_dispatch_failure_is_reported() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.point(req(1000, Category::FileWrite, "{}", false));
        h.orch
            .respond(1000, ResponseKind::Approve, None, &h.store)
            .unwrap();
        h.drain();

        h.orch.on_dispatch_settled(
            ApprovalResponse::approve(1000),
            Err(DispatchError::Cancelled),
        );
        assert_eq!(
            h.drain(),
            vec![ApprovalEvent::DispatchFailed {
                response: ApprovalResponse::approve(1000),
                error: "dispatch cancelled".to_string()
            }]
        );
        // Still answered; no second attempt.
        assert!(h.orch.is_answered(1000));
    }

    #[test]
    fn test_policy_reload_applies_to_next_decision() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.point(req(1000, Category::FileWrite, "{}", false));
        assert!(h.sent().is_empty());

        h.policy
            .replace(ApprovalPolicy::empty().with(Category::FileWrite, CategoryPolicy::enabled()));
        // Already decided; not re-evaluated.
        h.orch.on_store_commit(&h.store);
        assert!(h.sent().is_empty());

        h.point(req(2000, Category::FileWrite, "{}", false));
        assert_eq!(h.sent(), vec![ApprovalResponse::approve(2000)]);
    }

    #[test]
    fn test_consecutive_auto_approval_limit() {
        let mut h = Harness::new(reads_enabled().with_max_consecutive(2));
        h.point(req(1000, Category::FileRead, "a", false));
        h.point(req(2000, Category::FileRead, "b", false));
        h.point(req(3000, Category::FileRead, "c", false));
        assert_eq!(h.sent().len(), 2);
        assert_eq!(h.orch.phase(), ApprovalPhase::Decided(3000));

        h.orch
            .respond(3000, ResponseKind::Approve, None, &h.store)
            .unwrap();
        assert_eq!(h.orch.consecutive_auto_approvals(), 0);
        h.point(req(4000, Category::FileRead, "d", false));
        assert_eq!(h.sent().len(), 4);
    }

    #[test]
    fn test_yolo_approvals_do_not_count_toward_limit() {
        let mut h = Harness::new(
            reads_enabled()
                .with(Category::FileWrite, CategoryPolicy::disabled())
                .with_max_consecutive(2),
        );
        h.modes.set_yolo_mode(true);
        h.point(req(1000, Category::FileWrite, "{}", false));
        h.point(req(2000, Category::FileWrite, "{}", false));
        h.point(req(3000, Category::FileWrite, "{}", false));
        assert_eq!(h.sent().len(), 3);
        assert_eq!(h.orch.consecutive_auto_approvals(), 0);

        h.modes.set_yolo_mode(false);
        h.point(req(4000, Category::FileRead, "a.txt", false));
        assert_eq!(h.sent().last(), Some(&ApprovalResponse::approve(4000)));
        assert_eq!(h.orch.consecutive_auto_approvals(), 1);
    }

    #[test]
    fn test_ci_approvals_do_not_count_toward_limit() {
        let mut h = Harness::new(reads_enabled().with_max_consecutive(1));
        h.modes.set_ci_mode(true);
        h.point(req(1000, Category::FileRead, "a", false));
        h.point(req(2000, Category::FileRead, "b", false));
        h.modes.set_ci_mode(false);
        h.point(req(3000, Category::FileRead, "c", false));
        assert_eq!(h.sent().len(), 3);
        assert_eq!(h.orch.consecutive_auto_approvals(), 1);
    }

    #[test]
    fn test_orphaned_request_is_decided_after_snapshot() {
        let mut h = Harness::new(reads_enabled());
        h.snapshot(vec![
            req(1000, Category::FileRead, "a.txt", true),
            TranscriptEntry::notification(2000, Category::Text, "moving on", false),
        ]);
        assert_eq!(h.sent(), vec![ApprovalResponse::approve(1000)]);
    }

    #[test]
    fn test_pending_republished_on_text_change() {
        let mut h = Harness::new(ApprovalPolicy::empty());
        h.point(req(1000, Category::ShellCommand, "git st", true));
        h.point(req(1000, Category::ShellCommand, "git status", true));
        h.point(req(1000, Category::ShellCommand, "git status", false));
        let republished = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, ApprovalEvent::PendingChanged(Some(_))))
            .count();
        assert_eq!(republished, 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut h = Harness::new(reads_enabled());
        h.orch = ApprovalOrchestrator::new(
            h.policy.clone(),
            h.modes.clone(),
            h.sent.clone(),
            h.timers.clone(),
            mpsc::unbounded_channel().0,
        )
        .with_history(2);
        for ts in 1..=3 {
            h.point(req(ts, Category::FileRead, "x", false));
        }
        assert!(!h.orch.is_answered(1));
        assert!(h.orch.is_answered(3));
    }
}
