//! Sending responses to the agent process.
//!
//! The orchestrator hands responses to a [`TaskDispatcher`], which sends each
//! one on its own tokio task through an [`AgentResponder`] and posts the
//! outcome back as [`SessionEvent::DispatchSettled`]. The session loop never
//! waits on a send.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::Arc;

use par_agent_approval::{ApprovalResponse, DispatchError, ResponseDispatcher};
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::runtime::SessionSender;
use crate::session::SessionEvent;

/// Delivers one response to the agent.
pub trait AgentResponder: Send + Sync + 'static {
    fn send(
        &self,
        response: ApprovalResponse,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

// ---------------------------------------------------------------------------
// Task dispatcher
// ---------------------------------------------------------------------------

/// Sends that have been started and not yet settled, keyed by timestamp.
#[derive(Debug, Clone, Default)]
pub struct InFlightSends {
    inner: Arc<Mutex<HashMap<u64, AbortHandle>>>,
}

impl InFlightSends {
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Abort every pending send. Each one still settles, with
    /// [`DispatchError::TaskAborted`]. Returns how many were aborted.
    pub fn abort_all(&self) -> usize {
        let sends = self.inner.lock();
        for handle in sends.values() {
            handle.abort();
        }
        sends.len()
    }

    fn insert(&self, timestamp: u64, handle: AbortHandle) {
        self.inner.lock().insert(timestamp, handle);
    }

    fn remove(&self, timestamp: u64) {
        self.inner.lock().remove(&timestamp);
    }
}

/// [`ResponseDispatcher`] that runs each send on a tokio task.
pub struct TaskDispatcher<R> {
    responder: Arc<R>,
    events: SessionSender,
    in_flight: InFlightSends,
}

impl<R: AgentResponder> TaskDispatcher<R> {
    pub fn new(responder: R, events: SessionSender) -> Self {
        Self {
            responder: Arc::new(responder),
            events,
            in_flight: InFlightSends::default(),
        }
    }

    /// Shared view of the sends this dispatcher has in flight.
    pub fn in_flight(&self) -> InFlightSends {
        self.in_flight.clone()
    }
}

impl<R: AgentResponder> ResponseDispatcher for TaskDispatcher<R> {
    fn dispatch(&mut self, response: ApprovalResponse) {
        let timestamp = response.timestamp;
        let responder = Arc::clone(&self.responder);
        let outgoing = response.clone();
        let send = tokio::spawn(async move { responder.send(outgoing).await });
        self.in_flight.insert(timestamp, send.abort_handle());

        let events = self.events.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let result = match send.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(DispatchError::TaskAborted),
                Err(e) => Err(DispatchError::Transport(format!("send task panicked: {e}"))),
            };
            in_flight.remove(timestamp);
            if !events.send(SessionEvent::DispatchSettled { response, result }) {
                log::debug!("Dispatch: session gone before {timestamp} settled");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Responders
// ---------------------------------------------------------------------------

/// Writes each response as one line of JSON.
pub struct JsonLinesResponder<W> {
    writer: tokio::sync::Mutex<W>,
}

impl<W> JsonLinesResponder<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

fn io_to_dispatch(e: io::Error) -> DispatchError {
    match e.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => DispatchError::ChannelClosed,
        _ => DispatchError::Transport(e.to_string()),
    }
}

impl<W> AgentResponder for JsonLinesResponder<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, response: ApprovalResponse) -> Result<(), DispatchError> {
        let json = serde_json::to_string(&response)
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(format!("{json}\n").as_bytes())
            .await
            .map_err(io_to_dispatch)?;
        writer.flush().await.map_err(io_to_dispatch)
    }
}

/// Forwards responses on an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelResponder {
    tx: mpsc::UnboundedSender<ApprovalResponse>,
}

impl ChannelResponder {
    pub fn new(tx: mpsc::UnboundedSender<ApprovalResponse>) -> Self {
        Self { tx }
    }
}

impl AgentResponder for ChannelResponder {
    async fn send(&self, response: ApprovalResponse) -> Result<(), DispatchError> {
        self.tx
            .send(response)
            .map_err(|_| DispatchError::ChannelClosed)
    }
}
