//! The session loop on tokio.
//!
//! [`SessionRuntime::spawn`] moves a [`Session`] onto its own task and feeds
//! it from one unbounded channel. Agent updates, cutoff commands, user
//! responses, timer firings and dispatch outcomes all go through that
//! channel, so they are applied strictly in arrival order by a single writer.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use par_agent_config::{AgentClientConfig, ApprovalPolicy, ModeFlags, PolicyHandle, PolicyWatcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatch::{AgentResponder, InFlightSends, TaskDispatcher};
use crate::session::{Session, SessionEvent, SessionNotice};
use crate::timer::TokioApprovalTimer;

/// How often the policy watcher is polled for reload events.
const POLICY_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub enum RuntimeMessage {
    Event(SessionEvent),
    /// Stop once every in-flight response has settled.
    Shutdown,
}

/// Cloneable handle for posting events to the session loop.
#[derive(Debug, Clone)]
pub struct SessionSender {
    tx: mpsc::UnboundedSender<RuntimeMessage>,
}

impl SessionSender {
    pub fn new(tx: mpsc::UnboundedSender<RuntimeMessage>) -> Self {
        Self { tx }
    }

    /// Post `event`. Returns `false` if the loop has stopped.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(RuntimeMessage::Event(event)).is_ok()
    }

    fn shutdown(&self) -> bool {
        self.tx.send(RuntimeMessage::Shutdown).is_ok()
    }
}

/// What a session starts with.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub policy: ApprovalPolicy,
    pub modes: ModeFlags,
    pub decided_history: usize,
}

impl SessionSettings {
    pub fn from_config(config: &AgentClientConfig) -> Self {
        Self {
            policy: config.approval.clone(),
            modes: config.mode_flags(),
            decided_history: config.decided_history,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AgentClientConfig::default())
    }
}

pub struct SessionRuntime {
    sender: SessionSender,
    task: JoinHandle<Session>,
    in_flight: InFlightSends,
    policy_watch: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SessionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRuntime")
            .field("in_flight", &self.in_flight.len())
            .field("watching_policy", &self.policy_watch.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionRuntime {
    /// Start the session loop. Must be called from within a tokio runtime.
    ///
    /// Returns the runtime handle and the receiver for [`SessionNotice`]s.
    pub fn spawn<R: AgentResponder>(
        settings: SessionSettings,
        responder: R,
    ) -> (Self, mpsc::UnboundedReceiver<SessionNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let sender = SessionSender::new(tx);

        let dispatcher = TaskDispatcher::new(responder, sender.clone());
        let in_flight = dispatcher.in_flight();
        let session = Session::new(
            PolicyHandle::new(settings.policy),
            settings.modes,
            dispatcher,
            TokioApprovalTimer::new(sender.clone()),
            notice_tx,
        )
        .with_history(settings.decided_history);

        log::info!("Session loop starting");
        let task = tokio::spawn(run_loop(session, rx));

        (
            Self {
                sender,
                task,
                in_flight,
                policy_watch: None,
            },
            notice_rx,
        )
    }

    pub fn sender(&self) -> SessionSender {
        self.sender.clone()
    }

    pub fn send(&self, event: SessionEvent) -> bool {
        self.sender.send(event)
    }

    /// Responses currently being sent.
    pub fn in_flight(&self) -> &InFlightSends {
        &self.in_flight
    }

    /// Abort every response send still in progress. Each settles as
    /// [`par_agent_approval::DispatchError::TaskAborted`].
    pub fn cancel_dispatches(&self) -> usize {
        let aborted = self.in_flight.abort_all();
        if aborted > 0 {
            log::info!("Cancelled {aborted} in-flight response(s)");
        }
        aborted
    }

    /// Reload the approval policy whenever the config file at `path`
    /// changes. A file that fails to load leaves the current policy in place.
    pub fn watch_policy(&mut self, path: &Path, debounce_ms: u64) -> Result<()> {
        let watcher = PolicyWatcher::new(path, debounce_ms)
            .with_context(|| format!("Failed to watch policy file {}", path.display()))?;
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLICY_POLL_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(result) = watcher.next_policy() else {
                    continue;
                };
                // Errors are logged by the loader.
                if let Ok(policy) = result
                    && !sender.send(SessionEvent::PolicyReloaded(policy))
                {
                    break;
                }
            }
        });
        if let Some(previous) = self.policy_watch.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop the loop once in-flight responses have settled and hand back the
    /// final session state.
    pub async fn shutdown(mut self) -> Result<Session> {
        if let Some(watch) = self.policy_watch.take() {
            watch.abort();
        }
        if !self.sender.shutdown() {
            log::warn!("Session loop already stopped");
        }
        let session = self.task.await.context("Session loop task failed")?;
        log::info!("Session loop stopped");
        Ok(session)
    }
}

async fn run_loop(
    mut session: Session,
    mut rx: mpsc::UnboundedReceiver<RuntimeMessage>,
) -> Session {
    let mut stopping = false;
    while let Some(message) = rx.recv().await {
        match message {
            RuntimeMessage::Event(event) => session.handle(event),
            RuntimeMessage::Shutdown => stopping = true,
        }
        if stopping && session.orchestrator().in_flight_count() == 0 {
            break;
        }
    }
    session
}
