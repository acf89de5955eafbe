//! The auto-approval decision for a single action request.

use std::time::Duration;

use par_agent_config::ApprovalPolicy;
use par_agent_transcript::{Category, TranscriptEntry};

use crate::command_match::{allow_match, deny_match};

/// Why a request was rejected without asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoRejectReason {
    /// The command matched a deny pattern.
    DenyListed { pattern: String },
    /// CI mode, and the category is not enabled in the policy.
    CategoryDisabled(Category),
    /// CI mode, and the command is outside the allow list.
    NotAllowListed,
}

impl std::fmt::Display for AutoRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutoRejectReason::DenyListed { pattern } => {
                write!(f, "command matches deny pattern '{pattern}'")
            }
            AutoRejectReason::CategoryDisabled(category) => {
                write!(f, "{category} is not auto-approved and CI mode cannot ask")
            }
            AutoRejectReason::NotAllowListed => {
                f.write_str("command is not allow-listed and CI mode cannot ask")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Approve after `delay` (zero means now).
    AutoApprove { delay: Duration },
    AutoReject { reason: AutoRejectReason },
    PresentToUser,
}

impl Decision {
    fn approve_now() -> Self {
        Decision::AutoApprove {
            delay: Duration::ZERO,
        }
    }
}

/// Decide what to do with a completed action request.
///
/// Pure: the caller supplies the policy and mode flags it read for this
/// decision.
pub fn decide(
    entry: &TranscriptEntry,
    policy: &ApprovalPolicy,
    ci_mode: bool,
    yolo_mode: bool,
) -> Decision {
    if yolo_mode {
        return Decision::approve_now();
    }

    let category = entry.category;
    let enabled = policy.is_enabled(category);

    if ci_mode {
        if !enabled {
            return Decision::AutoReject {
                reason: AutoRejectReason::CategoryDisabled(category),
            };
        }
        // Lists still apply; the fallback for "ask" is reject.
        return match check_command(entry, policy) {
            CommandCheck::Denied(pattern) => Decision::AutoReject {
                reason: AutoRejectReason::DenyListed { pattern },
            },
            CommandCheck::NotAllowed => Decision::AutoReject {
                reason: AutoRejectReason::NotAllowListed,
            },
            CommandCheck::Ok => Decision::approve_now(),
        };
    }

    if !enabled {
        return Decision::PresentToUser;
    }

    match check_command(entry, policy) {
        CommandCheck::Denied(pattern) => Decision::AutoReject {
            reason: AutoRejectReason::DenyListed { pattern },
        },
        CommandCheck::NotAllowed => Decision::PresentToUser,
        CommandCheck::Ok => Decision::AutoApprove {
            delay: policy.effective_delay(category),
        },
    }
}

enum CommandCheck {
    Ok,
    Denied(String),
    NotAllowed,
}

fn check_command(entry: &TranscriptEntry, policy: &ApprovalPolicy) -> CommandCheck {
    let category = entry.category;
    if !category.is_shell_command_like() {
        return CommandCheck::Ok;
    }
    if let Some(pattern) = deny_match(&entry.text, policy.deny_list(category)) {
        return CommandCheck::Denied(pattern.to_string());
    }
    let allow = policy.allow_list(category);
    if !allow.is_empty() && !allow_match(&entry.text, allow) {
        return CommandCheck::NotAllowed;
    }
    CommandCheck::Ok
}
