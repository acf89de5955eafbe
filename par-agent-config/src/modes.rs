//! CI and YOLO mode flags.
//!
//! The flags are shared atomics so a toggle made from the UI (or a reload)
//! is seen by the next approval decision.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable names that control the mode flags.
pub const ENV_CI: &str = "CI";
pub const ENV_PAR_AGENT_CI: &str = "PAR_AGENT_CI";
pub const ENV_PAR_AGENT_YOLO: &str = "PAR_AGENT_YOLO";

#[derive(Debug, Clone, Default)]
pub struct ModeFlags {
    ci: Arc<AtomicBool>,
    yolo: Arc<AtomicBool>,
}

impl ModeFlags {
    pub fn new(ci_mode: bool, yolo_mode: bool) -> Self {
        Self {
            ci: Arc::new(AtomicBool::new(ci_mode)),
            yolo: Arc::new(AtomicBool::new(yolo_mode)),
        }
    }

    /// Unattended mode: nothing is ever presented to a user.
    pub fn ci_mode(&self) -> bool {
        self.ci.load(Ordering::Relaxed)
    }

    /// Approve everything immediately.
    pub fn yolo_mode(&self) -> bool {
        self.yolo.load(Ordering::Relaxed)
    }

    pub fn set_ci_mode(&self, on: bool) {
        self.ci.store(on, Ordering::Relaxed);
        log::info!("CI mode {}", if on { "enabled" } else { "disabled" });
    }

    pub fn set_yolo_mode(&self, on: bool) {
        self.yolo.store(on, Ordering::Relaxed);
        log::info!("YOLO mode {}", if on { "enabled" } else { "disabled" });
    }
}

/// `true` unless the value is empty, `0` or `false` (case-insensitive).
fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
}

/// Resolve the mode flags from the config file values and the environment.
///
/// The environment can only turn a mode on. `lookup` is usually
/// `|k| std::env::var(k).ok()`.
pub fn resolve_modes<F>(ci_mode: bool, yolo_mode: bool, lookup: F) -> (bool, bool)
where
    F: Fn(&str) -> Option<String>,
{
    let env_on = |key: &str| lookup(key).is_some_and(|v| is_truthy(&v));
    let ci = ci_mode || env_on(ENV_CI) || env_on(ENV_PAR_AGENT_CI);
    let yolo = yolo_mode || env_on(ENV_PAR_AGENT_YOLO);
    (ci, yolo)
}
