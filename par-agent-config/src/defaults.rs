//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on the
//! config structs, and by their `Default` impls.

use std::collections::BTreeMap;

use par_agent_transcript::Category;

use crate::policy::CategoryPolicy;
use crate::types::LogLevel;

/// Size of the "already decided" and "answered" rings.
pub fn decided_history() -> usize {
    100
}

pub fn log_level() -> LogLevel {
    LogLevel::Info
}

/// Command prefixes that are never auto-approved.
pub fn shell_deny_list() -> Vec<String> {
    ["rm -rf", "sudo", "git push --force", "git reset --hard"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Read-only actions are auto-approved out of the box; everything that
/// changes state has to be opted into.
pub fn categories() -> BTreeMap<Category, CategoryPolicy> {
    let mut categories = BTreeMap::new();
    for category in Category::ACTIONS {
        let policy = match category {
            Category::FileRead | Category::TodoUpdate => CategoryPolicy::enabled(),
            Category::ShellCommand => {
                CategoryPolicy::disabled().with_deny_list(shell_deny_list())
            }
            _ => CategoryPolicy::disabled(),
        };
        categories.insert(category, policy);
    }
    categories
}

/// Debounce for the policy file watcher, in milliseconds.
pub fn watch_debounce_ms() -> u64 {
    100
}
