//! Logging bridge for par-agent.
//!
//! Routes every `log::info!()` etc. from all workspace crates to
//! `/tmp/par_agent_debug.log` on Unix/macOS, or `%TEMP%\par_agent_debug.log`
//! on Windows, so log output never interleaves with the replay transcript on
//! stdout. When `RUST_LOG` is set, records are mirrored to stderr as well.
//!
//! Level precedence: `--log-level` flag, then `RUST_LOG`, then the config
//! file's `log_level` (applied after the config is loaded).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use par_agent_config::LogLevel;
use parking_lot::Mutex;

/// Where the active log level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    Cli,
    RustLog,
    /// Nothing explicit yet; the config file may still set it.
    Default,
}

struct LogBridge {
    file: Mutex<Option<File>>,
    mirror_stderr: bool,
    source: LevelSource,
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{}] [{:<5}] [{}] {}\n",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
        if self.mirror_stderr {
            let _ = std::io::stderr().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        if let Some(file) = self.file.lock().as_mut() {
            let _ = file.flush();
        }
    }
}

/// Path of the debug log file.
pub fn log_path() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/tmp/par_agent_debug.log")
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("par_agent_debug.log")
    }
}

/// Pick the log level from the CLI flag and the `RUST_LOG` value.
///
/// `RUST_LOG` may be a plain level (`debug`) or env_logger-style directives
/// (`par_agent=debug,warn`); the most verbose level named wins.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    rust_log: Option<&str>,
) -> (log::LevelFilter, LevelSource) {
    if let Some(level) = cli_level {
        return (level.to_level_filter(), LevelSource::Cli);
    }
    let from_env = rust_log.and_then(|value| {
        value
            .split(',')
            .filter_map(|directive| directive.rsplit('=').next().and_then(LogLevel::parse))
            .map(LogLevel::to_level_filter)
            .max()
    });
    match from_env {
        Some(filter) => (filter, LevelSource::RustLog),
        None => (log::LevelFilter::Info, LevelSource::Default),
    }
}

/// Install the bridge as the global logger. Safe to call more than once;
/// only the first call has an effect.
pub fn init_log_bridge(cli_level: Option<LogLevel>) -> LevelSource {
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter, source) = resolve_level(cli_level, rust_log.as_deref());

    let path = log_path();
    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(&path)
        .ok();

    let bridge = BRIDGE.get_or_init(|| LogBridge {
        file: Mutex::new(file),
        mirror_stderr: rust_log.is_some(),
        source,
    });

    if log::set_logger(bridge).is_ok() {
        log::set_max_level(filter);
        if let Some(file) = bridge.file.lock().as_mut() {
            let _ = writeln!(
                file,
                "{}\npar-agent {} log started at {} (level={filter}, from {source:?})\n{}",
                "=".repeat(80),
                crate::VERSION,
                chrono::Local::now().to_rfc3339(),
                "=".repeat(80)
            );
        }
    }
    bridge.source
}

/// Apply the config file's level, unless the CLI or `RUST_LOG` already
/// chose one.
pub fn apply_config_level(level: LogLevel) {
    if BRIDGE.get().map(|b| b.source) == Some(LevelSource::Default) {
        log::set_max_level(level.to_level_filter());
        log::debug!("Log level set from config: {:?}", level);
    }
}
