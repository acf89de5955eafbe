//! Replaying a recorded agent feed through a live session.
//!
//! A feed is a JSON-lines file, one [`FeedEvent`] per line. Blank lines and
//! lines starting with `#` are skipped:
//!
//! ```text
//! # agent starts streaming a command, then completes it
//! {"type":"point_update","entry":{"ts":1000,"kind":"action_request","category":"shell_command","text":"git","partial":true}}
//! {"type":"point_update","entry":{"ts":1000,"kind":"action_request","category":"shell_command","text":"git status"}}
//! {"type":"respond","timestamp":1000,"kind":"approve"}
//! {"type":"wait","ms":500}
//! ```

use std::io::BufRead;
use std::time::Duration;

use anyhow::Result;
use par_agent_approval::{ApprovalEvent, ApprovalResponse, ResponseKind};
use par_agent_transcript::TranscriptEntry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::runtime::SessionRuntime;
use crate::session::{SessionEvent, SessionNotice};

/// One line of a replay feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    Snapshot {
        entries: Vec<TranscriptEntry>,
    },
    PointUpdate {
        entry: TranscriptEntry,
    },
    SetCutoff {
        timestamp: u64,
    },
    ResetCutoff,
    /// Hide everything received so far.
    Clear,
    Local {
        entry: TranscriptEntry,
    },
    /// A user response to an action request.
    Respond {
        timestamp: u64,
        kind: ResponseKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Let timers run for `ms` before the next line.
    Wait {
        ms: u64,
    },
}

impl FeedEvent {
    /// The session event for this line, or `None` for [`FeedEvent::Wait`].
    pub fn into_session_event(self) -> Option<SessionEvent> {
        Some(match self {
            FeedEvent::Snapshot { entries } => SessionEvent::Snapshot(entries),
            FeedEvent::PointUpdate { entry } => SessionEvent::PointUpdate(entry),
            FeedEvent::SetCutoff { timestamp } => SessionEvent::SetCutoff(timestamp),
            FeedEvent::ResetCutoff => SessionEvent::ResetCutoff,
            FeedEvent::Clear => SessionEvent::ClearTranscript,
            FeedEvent::Local { entry } => SessionEvent::LocalEntry(entry),
            FeedEvent::Respond {
                timestamp,
                kind,
                text,
            } => SessionEvent::UserResponse {
                timestamp,
                kind,
                text,
            },
            FeedEvent::Wait { .. } => return None,
        })
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("feed line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a whole feed.
pub fn parse_feed<R: BufRead>(reader: R) -> Result<Vec<FeedEvent>, FeedError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| FeedError::Parse {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// One-line rendering of a notice for the replay output. Commit and
/// transcript notices are summarised.
pub fn format_notice(notice: &SessionNotice) -> String {
    match notice {
        SessionNotice::Committed(commit) => {
            let mut line = format!("commit {:?}", commit.changed);
            if !commit.completed.is_empty() {
                line.push_str(&format!(" completed {:?}", commit.completed));
            }
            if !commit.orphan_completed.is_empty() {
                line.push_str(&format!(" orphan {:?}", commit.orphan_completed));
            }
            line
        }
        SessionNotice::TranscriptChanged { visible } => {
            format!("transcript {} visible", visible.len())
        }
        SessionNotice::ResponseRefused { timestamp, error } => {
            format!("refused {timestamp}: {error}")
        }
        SessionNotice::Approval(event) => match event {
            ApprovalEvent::PendingChanged(Some(pending)) => format!(
                "pending {} {}{}: {}",
                pending.timestamp,
                pending.category,
                if pending.partial { " (streaming)" } else { "" },
                pending.text
            ),
            ApprovalEvent::PendingChanged(None) => "pending none".to_string(),
            ApprovalEvent::AwaitingUser {
                timestamp,
                category,
            } => format!("ask {timestamp} {category}"),
            ApprovalEvent::AutoApproved {
                timestamp,
                category,
            } => format!("auto-approve {timestamp} {category}"),
            ApprovalEvent::AutoRejected { timestamp, reason } => {
                format!("auto-reject {timestamp}: {reason}")
            }
            ApprovalEvent::Scheduled { timestamp, delay } => {
                format!("scheduled {timestamp} in {:.1}s", delay.as_secs_f64())
            }
            ApprovalEvent::TimerCancelled { timestamp } => format!("timer cancelled {timestamp}"),
            ApprovalEvent::Dispatched(response) => match &response.text {
                Some(text) => format!("sent {} {}: {text}", response.kind, response.timestamp),
                None => format!("sent {} {}", response.kind, response.timestamp),
            },
            ApprovalEvent::DispatchFailed { response, error } => {
                format!("send failed {} {}: {error}", response.kind, response.timestamp)
            }
        },
    }
}

/// Outcome of a replay run.
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    /// Number of feed lines applied (including waits).
    pub lines: usize,
    /// Every response handed to the dispatcher, in order.
    pub responses: Vec<ApprovalResponse>,
    /// The visible transcript at the end of the run.
    pub visible: Vec<TranscriptEntry>,
}

/// Feed `events` into `runtime`, reporting every notice through `on_line`,
/// then shut the runtime down.
pub async fn run_replay<F>(
    events: Vec<FeedEvent>,
    runtime: SessionRuntime,
    mut notices: mpsc::UnboundedReceiver<SessionNotice>,
    mut on_line: F,
) -> Result<ReplayReport>
where
    F: FnMut(&str),
{
    let mut report = ReplayReport::default();
    let mut observe = |notice: SessionNotice, report: &mut ReplayReport| {
        if let SessionNotice::Approval(ApprovalEvent::Dispatched(response)) = &notice {
            report.responses.push(response.clone());
        }
        on_line(&format_notice(&notice));
    };

    for event in events {
        report.lines += 1;
        match event {
            FeedEvent::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            other => {
                if let Some(event) = other.into_session_event()
                    && !runtime.send(event)
                {
                    anyhow::bail!("Session loop stopped during replay");
                }
            }
        }
        // Let the loop catch up so output stays in feed order.
        tokio::task::yield_now().await;
        while let Ok(notice) = notices.try_recv() {
            observe(notice, &mut report);
        }
    }

    let session = runtime.shutdown().await?;
    while let Ok(notice) = notices.try_recv() {
        observe(notice, &mut report);
    }
    report.visible = session.visible_entries();
    Ok(report)
}
