//! The synchronous session core.
//!
//! A [`Session`] owns the message store, the visibility filter and the
//! approval orchestrator, and processes one [`SessionEvent`] at a time. It
//! never awaits: whatever drives it (the tokio loop in [`crate::runtime`], or
//! a test calling [`Session::handle`] directly) is the single writer.
//!
//! Per event the order of notices is fixed: `Committed` (from the store
//! subscriber, only if something changed), then any approval events, then
//! `TranscriptChanged`.

use par_agent_approval::{
    ApprovalError, ApprovalEvent, ApprovalOrchestrator, ApprovalResponse, ApprovalTimer,
    DispatchError, ResponseDispatcher, ResponseKind,
};
use par_agent_config::{ApprovalPolicy, ModeFlags, PolicyHandle};
use par_agent_transcript::{MessageStore, StoreCommit, TranscriptEntry, VisibilityFilter};
use tokio::sync::mpsc;

/// Input to the session. Everything that changes session state arrives as
/// one of these.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full transcript restatement from the agent.
    Snapshot(Vec<TranscriptEntry>),
    /// Single-entry update from the agent.
    PointUpdate(TranscriptEntry),
    SetCutoff(u64),
    ResetCutoff,
    /// Hide everything received so far ("clear transcript").
    ClearTranscript,
    /// A user-originated entry shown alongside the agent's.
    LocalEntry(TranscriptEntry),
    UserResponse {
        timestamp: u64,
        kind: ResponseKind,
        text: Option<String>,
    },
    ApprovalTimerFired(u64),
    DispatchSettled {
        response: ApprovalResponse,
        result: Result<(), DispatchError>,
    },
    PolicyReloaded(ApprovalPolicy),
}

/// Output of the session, for the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Committed(StoreCommit),
    TranscriptChanged { visible: Vec<TranscriptEntry> },
    Approval(ApprovalEvent),
    /// A user response was refused; nothing was sent.
    ResponseRefused {
        timestamp: u64,
        error: ApprovalError,
    },
}

pub struct Session {
    store: MessageStore,
    filter: VisibilityFilter,
    orchestrator: ApprovalOrchestrator,
    policy: PolicyHandle,
    modes: ModeFlags,
    approval_rx: mpsc::UnboundedReceiver<ApprovalEvent>,
    notices: mpsc::UnboundedSender<SessionNotice>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("cutoff", &self.filter.cutoff())
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        policy: PolicyHandle,
        modes: ModeFlags,
        dispatcher: impl ResponseDispatcher + 'static,
        timer: impl ApprovalTimer + 'static,
        notices: mpsc::UnboundedSender<SessionNotice>,
    ) -> Self {
        let (approval_tx, approval_rx) = mpsc::unbounded_channel();
        let orchestrator = ApprovalOrchestrator::new(
            policy.clone(),
            modes.clone(),
            dispatcher,
            timer,
            approval_tx,
        );

        let mut store = MessageStore::new();
        let commit_tx = notices.clone();
        store.subscribe(move |commit| {
            let _ = commit_tx.send(SessionNotice::Committed(commit.clone()));
        });

        Self {
            store,
            filter: VisibilityFilter::new(),
            orchestrator,
            policy,
            modes,
            approval_rx,
            notices,
        }
    }

    /// Number of decided and answered timestamps the orchestrator remembers.
    pub fn with_history(mut self, capacity: usize) -> Self {
        self.orchestrator = self.orchestrator.with_history(capacity);
        self
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Snapshot(entries) => {
                log::trace!("Session: snapshot with {} entries", entries.len());
                if self.store.apply_snapshot(entries) {
                    self.after_commit();
                }
            }
            SessionEvent::PointUpdate(entry) => {
                if self.store.apply_point_update(entry) {
                    self.after_commit();
                }
            }
            SessionEvent::SetCutoff(timestamp) => {
                self.filter.set_cutoff(timestamp);
                self.publish_visible();
            }
            SessionEvent::ResetCutoff => {
                self.filter.reset_cutoff();
                self.publish_visible();
            }
            SessionEvent::ClearTranscript => {
                let cutoff = self.filter.clear_now();
                log::info!("Session: transcript cleared (cutoff {cutoff})");
                self.publish_visible();
            }
            SessionEvent::LocalEntry(entry) => {
                self.filter.push_local_entry(entry);
                self.publish_visible();
            }
            SessionEvent::UserResponse {
                timestamp,
                kind,
                text,
            } => {
                if let Err(error) = self.orchestrator.respond(timestamp, kind, text, &self.store) {
                    log::warn!("Session: refused {kind} for {timestamp}: {error}");
                    self.notify(SessionNotice::ResponseRefused { timestamp, error });
                }
                self.forward_approval_events();
            }
            SessionEvent::ApprovalTimerFired(timestamp) => {
                self.orchestrator.on_timer_fired(timestamp, &self.store);
                self.forward_approval_events();
            }
            SessionEvent::DispatchSettled { response, result } => {
                self.orchestrator.on_dispatch_settled(response, result);
                self.forward_approval_events();
            }
            SessionEvent::PolicyReloaded(policy) => {
                self.policy.replace(policy);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    pub fn orchestrator(&self) -> &ApprovalOrchestrator {
        &self.orchestrator
    }

    pub fn policy(&self) -> &PolicyHandle {
        &self.policy
    }

    pub fn modes(&self) -> &ModeFlags {
        &self.modes
    }

    pub fn visible_entries(&self) -> Vec<TranscriptEntry> {
        self.filter.visible_entries(&self.store)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn after_commit(&mut self) {
        self.orchestrator.on_store_commit(&self.store);
        self.forward_approval_events();
        self.publish_visible();
    }

    fn forward_approval_events(&mut self) {
        while let Ok(event) = self.approval_rx.try_recv() {
            self.notify(SessionNotice::Approval(event));
        }
    }

    fn publish_visible(&self) {
        self.notify(SessionNotice::TranscriptChanged {
            visible: self.visible_entries(),
        });
    }

    fn notify(&self, notice: SessionNotice) {
        let _ = self.notices.send(notice);
    }
}
