//! Per-category auto-approval policy.
//!
//! The policy is read fresh on every decision, so a hot reload through
//! [`PolicyHandle::replace`] takes effect for the next action request
//! without restarting the session.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use par_agent_transcript::Category;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Auto-approval settings for one action category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryPolicy {
    /// Auto-approve requests of this category.
    pub enabled: bool,

    /// Grace period before the approval is sent. `None` uses the category's
    /// built-in default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<f64>,

    /// Command prefixes that may be auto-approved (shell commands only).
    /// Empty means "any command".
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_list: Vec<String>,

    /// Command prefixes that are never auto-approved (shell commands only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deny_list: Vec<String>,
}

impl CategoryPolicy {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    pub fn with_allow_list<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deny_list<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny_list = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// The full auto-approval policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalPolicy {
    /// Category settings. A category that is missing here is disabled.
    pub categories: BTreeMap<Category, CategoryPolicy>,

    /// Stop auto-approving after this many approvals in a row without a
    /// human response, and ask instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_auto_approvals: Option<u32>,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            categories: crate::defaults::categories(),
            max_consecutive_auto_approvals: None,
        }
    }
}

impl ApprovalPolicy {
    /// A policy with every category disabled.
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
            max_consecutive_auto_approvals: None,
        }
    }

    /// Builder-style setter for one category.
    pub fn with(mut self, category: Category, policy: CategoryPolicy) -> Self {
        self.categories.insert(category, policy);
        self
    }

    pub fn with_max_consecutive(mut self, max: u32) -> Self {
        self.max_consecutive_auto_approvals = Some(max);
        self
    }

    pub fn get(&self, category: Category) -> Option<&CategoryPolicy> {
        self.categories.get(&category)
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.get(category).is_some_and(|p| p.enabled)
    }

    /// Delay before an auto-approval for `category` is sent.
    ///
    /// Assumes a validated policy; an invalid delay is treated as zero.
    pub fn effective_delay(&self, category: Category) -> Duration {
        let seconds = self
            .get(category)
            .and_then(|p| p.delay_seconds)
            .unwrap_or_else(|| category.default_delay_seconds());
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
    }

    pub fn allow_list(&self, category: Category) -> &[String] {
        self.get(category).map_or(&[], |p| p.allow_list.as_slice())
    }

    pub fn deny_list(&self, category: Category) -> &[String] {
        self.get(category).map_or(&[], |p| p.deny_list.as_slice())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (category, policy) in &self.categories {
            if !category.is_action() {
                return Err(ConfigError::Validation(format!(
                    "approval.categories.{category}: not an action category"
                )));
            }
            if let Some(delay) = policy.delay_seconds
                && (!delay.is_finite() || delay < 0.0)
            {
                return Err(ConfigError::Validation(format!(
                    "approval.categories.{category}.delay_seconds: must be a finite, non-negative number (got {delay})"
                )));
            }
            if policy
                .allow_list
                .iter()
                .chain(&policy.deny_list)
                .any(|p| p.trim().is_empty())
            {
                return Err(ConfigError::Validation(format!(
                    "approval.categories.{category}: allow/deny patterns must not be empty"
                )));
            }
        }
        if self.max_consecutive_auto_approvals == Some(0) {
            return Err(ConfigError::Validation(
                "approval.max_consecutive_auto_approvals: must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared, hot-swappable handle to the active policy.
#[derive(Debug, Clone, Default)]
pub struct PolicyHandle {
    inner: Arc<RwLock<ApprovalPolicy>>,
}

impl PolicyHandle {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(policy)),
        }
    }

    /// A copy of the current policy.
    pub fn snapshot(&self) -> ApprovalPolicy {
        self.inner.read().clone()
    }

    /// Swap in a new policy. Takes effect on the next decision.
    pub fn replace(&self, policy: ApprovalPolicy) {
        *self.inner.write() = policy;
        log::info!("Approval policy replaced");
    }

    /// Edit the policy in place.
    pub fn update(&self, f: impl FnOnce(&mut ApprovalPolicy)) {
        f(&mut self.inner.write());
    }
}

impl From<ApprovalPolicy> for PolicyHandle {
    fn from(policy: ApprovalPolicy) -> Self {
        Self::new(policy)
    }
}
