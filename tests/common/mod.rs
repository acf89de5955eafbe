//! Shared integration test helpers for par-agent.
//!
//! Include with `mod common;` at the top of each test file. The
//! `#![allow(dead_code)]` below suppresses warnings when a file only uses
//! some of the helpers.

#![allow(dead_code)]

use std::time::Duration;

use par_agent::dispatch::ChannelResponder;
use par_agent::{SessionNotice, SessionRuntime, SessionSettings};
use par_agent_approval::{ApprovalEvent, ApprovalResponse};
use par_agent_config::{ApprovalPolicy, ModeFlags};
use par_agent_transcript::{Category, TranscriptEntry};
use tokio::sync::mpsc;

/// Settings with `policy` and the given modes, default history.
pub fn settings(policy: ApprovalPolicy, ci_mode: bool, yolo_mode: bool) -> SessionSettings {
    SessionSettings {
        policy,
        modes: ModeFlags::new(ci_mode, yolo_mode),
        decided_history: 100,
    }
}

/// A running session whose responses arrive on the returned channel.
pub struct TestSession {
    pub runtime: SessionRuntime,
    pub notices: mpsc::UnboundedReceiver<SessionNotice>,
    pub responses: mpsc::UnboundedReceiver<ApprovalResponse>,
}

/// Spawn a session on the current tokio runtime.
pub fn spawn_session(settings: SessionSettings) -> TestSession {
    let (tx, responses) = mpsc::unbounded_channel();
    let (runtime, notices) = SessionRuntime::spawn(settings, ChannelResponder::new(tx));
    TestSession {
        runtime,
        notices,
        responses,
    }
}

/// Let spawned tasks run. Under paused time this also advances the clock
/// by `ms`.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Everything currently queued on `rx`.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

/// Approval events among `notices`, in order.
pub fn approval_events(notices: &[SessionNotice]) -> Vec<&ApprovalEvent> {
    notices
        .iter()
        .filter_map(|n| match n {
            SessionNotice::Approval(event) => Some(event),
            _ => None,
        })
        .collect()
}

pub fn shell(ts: u64, command: &str, partial: bool) -> TranscriptEntry {
    TranscriptEntry::action_request(ts, Category::ShellCommand, command, partial)
}

pub fn say(ts: u64, text: &str, partial: bool) -> TranscriptEntry {
    TranscriptEntry::notification(ts, Category::Text, text, partial)
}
