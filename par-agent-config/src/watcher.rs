//! Policy file watcher for hot reload.
//!
//! Watches the config file and reports changes so the running session can
//! swap in the new approval policy. Editors often save in several steps, so
//! events within the debounce window are collapsed into one.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::config::AgentClientConfig;
use crate::error::ConfigError;
use crate::policy::{ApprovalPolicy, PolicyHandle};

/// The watched file changed and should be reloaded.
#[derive(Debug, Clone)]
pub struct PolicyReloadEvent {
    pub path: PathBuf,
}

/// Watches the config file and queues [`PolicyReloadEvent`]s.
pub struct PolicyWatcher {
    /// Kept alive to keep watching.
    _watcher: Box<dyn Watcher + Send>,
    event_receiver: Receiver<PolicyReloadEvent>,
}

impl std::fmt::Debug for PolicyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyWatcher").finish_non_exhaustive()
    }
}

/// Returns `true` if an event at `now` falls outside the debounce window,
/// and records it as the last sent event.
fn debounce_allows(last: &Mutex<Option<Instant>>, now: Instant, window: Duration) -> bool {
    let mut last = last.lock();
    match *last {
        Some(prev) if now.duration_since(prev) < window => {
            log::trace!("Debouncing policy reload event");
            false
        }
        _ => {
            *last = Some(now);
            true
        }
    }
}

/// Handler shared by both watcher backends: filter to `filename`, debounce,
/// and forward on `tx`.
fn make_event_handler(
    filename: OsString,
    path: PathBuf,
    debounce: Duration,
    tx: Sender<PolicyReloadEvent>,
    last_event_time: Arc<Mutex<Option<Instant>>>,
) -> impl Fn(std::result::Result<Event, notify::Error>) + Send + 'static {
    move |result: notify::Result<Event>| {
        let Ok(event) = result else {
            return;
        };
        // Create covers editors that save by rename.
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        if !event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|f| f == filename))
        {
            return;
        }
        if !debounce_allows(&last_event_time, Instant::now(), debounce) {
            return;
        }
        log::info!("Policy file changed: {}", path.display());
        if let Err(e) = tx.send(PolicyReloadEvent { path: path.clone() }) {
            log::error!("Failed to send policy reload event: {}", e);
        }
    }
}

impl PolicyWatcher {
    /// Watch `config_path`.
    ///
    /// Uses the platform's native watcher, falling back to polling every
    /// 500 ms where that is unavailable (containers, network filesystems).
    /// The parent directory is watched so atomic saves are seen.
    pub fn new(config_path: &Path, debounce_ms: u64) -> Result<Self> {
        if !config_path.exists() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        }

        let canonical = config_path
            .canonicalize()
            .unwrap_or_else(|_| config_path.to_path_buf());
        let filename = canonical
            .file_name()
            .context("Config path has no filename")?
            .to_os_string();
        let parent_dir = canonical
            .parent()
            .context("Config path has no parent directory")?
            .to_path_buf();

        let (tx, rx) = channel();
        let debounce = Duration::from_millis(debounce_ms);
        let last_event_time = Arc::new(Mutex::new(None));

        let mut watcher =
            Self::create_watcher(&filename, &canonical, debounce, &tx, &last_event_time)?;
        watcher
            .watch(&parent_dir, RecursiveMode::NonRecursive)
            .with_context(|| {
                format!("Failed to watch config directory: {}", parent_dir.display())
            })?;

        log::info!("Policy hot reload: watching {}", canonical.display());

        Ok(Self {
            _watcher: watcher,
            event_receiver: rx,
        })
    }

    fn create_watcher(
        filename: &OsString,
        path: &Path,
        debounce: Duration,
        tx: &Sender<PolicyReloadEvent>,
        last_event_time: &Arc<Mutex<Option<Instant>>>,
    ) -> Result<Box<dyn Watcher + Send>> {
        let handler = || {
            make_event_handler(
                filename.clone(),
                path.to_path_buf(),
                debounce,
                tx.clone(),
                Arc::clone(last_event_time),
            )
        };

        match notify::recommended_watcher(handler()) {
            Ok(w) => {
                log::debug!("Policy watcher: using native backend");
                Ok(Box::new(w))
            }
            Err(e) => {
                log::warn!(
                    "Policy watcher: native backend unavailable ({}); falling back to PollWatcher",
                    e
                );
                let poll = PollWatcher::new(
                    handler(),
                    NotifyConfig::default().with_poll_interval(Duration::from_millis(500)),
                )
                .context("Failed to create fallback PollWatcher")?;
                Ok(Box::new(poll))
            }
        }
    }

    /// Next pending reload event, if any (non-blocking).
    pub fn try_recv(&self) -> Option<PolicyReloadEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Drain pending events and, if there were any, load the file's
    /// policy.
    ///
    /// Returns `None` when nothing changed. A file that fails to load is
    /// reported as an error so the caller can keep its current policy.
    pub fn next_policy(&self) -> Option<Result<ApprovalPolicy, ConfigError>> {
        let mut latest = None;
        while let Some(event) = self.try_recv() {
            latest = Some(event);
        }
        let event = latest?;
        Some(load_policy(&event.path))
    }
}

/// Load the approval policy from the config file at `path`.
pub fn load_policy(path: &Path) -> Result<ApprovalPolicy, ConfigError> {
    AgentClientConfig::load_from(path)
        .map(|config| config.approval)
        .inspect_err(|e| log::error!("Policy reload failed for {}: {}", path.display(), e))
}

/// Load `path` and replace the policy in `handle` with the file's policy.
/// On error the previous policy stays in place.
pub fn reload_policy(path: &Path, handle: &PolicyHandle) -> Result<(), ConfigError> {
    handle.replace(load_policy(path)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use par_agent_transcript::Category;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_creation_with_existing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "ci_mode: false\n").expect("Failed to write config");

        assert!(PolicyWatcher::new(&config_path, 100).is_ok());
    }

    #[test]
    fn test_watcher_creation_with_nonexistent_file() {
        let path = PathBuf::from("/tmp/nonexistent_policy_watcher_test/config.yaml");
        assert!(PolicyWatcher::new(&path, 100).is_err());
    }

    #[test]
    fn test_no_events_initially() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "ci_mode: false\n").expect("Failed to write config");

        let watcher = PolicyWatcher::new(&config_path, 100).expect("watcher");
        assert!(watcher.try_recv().is_none());
        assert!(watcher.next_policy().is_none());
    }

    #[test]
    fn test_debounce_window() {
        let last = Mutex::new(None);
        let start = Instant::now();
        let window = Duration::from_millis(100);
        assert!(debounce_allows(&last, start, window));
        assert!(!debounce_allows(&last, start + Duration::from_millis(50), window));
        assert!(debounce_allows(&last, start + Duration::from_millis(150), window));
    }

    #[test]
    fn test_reload_policy_replaces_on_success() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            "approval:\n  categories:\n    file_write:\n      enabled: true\n",
        )
        .expect("write");

        let handle = PolicyHandle::new(ApprovalPolicy::empty());
        reload_policy(&path, &handle).expect("reload");
        assert!(handle.snapshot().is_enabled(Category::FileWrite));
    }

    #[test]
    fn test_load_policy_reads_approval_section() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            "approval:\n  max_consecutive_auto_approvals: 3\n  categories: {}\n",
        )
        .expect("write");

        let policy = load_policy(&path).expect("load");
        assert_eq!(policy.max_consecutive_auto_approvals, Some(3));
        assert!(!policy.is_enabled(Category::FileRead));
    }

    #[test]
    fn test_reload_policy_keeps_previous_on_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "decided_history: 0\n").expect("write");

        let handle = PolicyHandle::new(ApprovalPolicy::default());
        assert!(reload_policy(&path, &handle).is_err());
        assert!(handle.snapshot().is_enabled(Category::FileRead));
    }

    #[test]
    fn test_modification_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "ci_mode: false\n").expect("Failed to write config");

        let watcher = PolicyWatcher::new(&config_path, 50).expect("watcher");
        std::thread::sleep(Duration::from_millis(100));
        fs::write(&config_path, "ci_mode: true\n").expect("Failed to rewrite config");

        // Native is faster; poll takes up to 500ms
        std::thread::sleep(Duration::from_millis(700));

        // Platform-dependent, don't assert that an event arrived
        if let Some(event) = watcher.try_recv() {
            assert!(event.path.ends_with("config.yaml"));
        }
    }

    #[test]
    fn test_debug_impl() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "ci_mode: false\n").expect("Failed to write config");

        let watcher = PolicyWatcher::new(&config_path, 100).expect("watcher");
        assert!(format!("{:?}", watcher).contains("PolicyWatcher"));
    }
}
