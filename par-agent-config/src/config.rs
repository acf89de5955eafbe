//! Client configuration file: loading, saving and path resolution.
//!
//! The file lives at `~/.config/par-agent/config.yaml` by default. A path
//! ending in `.toml` is read and written as TOML instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::modes::{ModeFlags, resolve_modes};
use crate::policy::ApprovalPolicy;
use crate::types::{ConfigFormat, LogLevel};

/// Everything the client reads from its config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentClientConfig {
    /// Auto-approval policy.
    pub approval: ApprovalPolicy,

    /// Never present anything to a user; decide from policy alone.
    pub ci_mode: bool,

    /// Approve every request immediately.
    pub yolo_mode: bool,

    #[serde(default = "crate::defaults::log_level")]
    pub log_level: LogLevel,

    /// How many decided/answered timestamps are remembered.
    #[serde(default = "crate::defaults::decided_history")]
    pub decided_history: usize,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            approval: ApprovalPolicy::default(),
            ci_mode: false,
            yolo_mode: false,
            log_level: crate::defaults::log_level(),
            decided_history: crate::defaults::decided_history(),
        }
    }
}

impl AgentClientConfig {
    /// Get the configuration directory path (using XDG convention)
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("par-agent")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("par-agent")
            } else {
                PathBuf::from(".")
            }
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Load from `path`, writing a default file there if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Config path: {:?}", path);
        if path.exists() {
            return Self::load_from(path);
        }

        log::info!("Config file not found, creating default at {:?}", path);
        let config = Self::default();
        if let Err(e) = config.save_to(path) {
            log::error!("Failed to save default config: {}", e);
            return Err(e);
        }
        Ok(config)
    }

    /// Load and validate an existing file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        log::info!("Loading existing config from {:?}", path);
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::parse(&contents, format)
    }

    /// Parse and validate config text.
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: Self = match format {
            // An empty YAML document is "all defaults", not an error.
            ConfigFormat::Yaml if contents.trim().is_empty() => Self::default(),
            ConfigFormat::Yaml => serde_yaml_ng::from_str(contents)?,
            ConfigFormat::Toml => toml::from_str(contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        Ok(match format {
            ConfigFormat::Yaml => serde_yaml_ng::to_string(self)?,
            ConfigFormat::Toml => toml::to_string(self)?,
        })
    }

    /// Save to `path` in the format implied by its extension.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
        }

        let text = self.render(format)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, &text).map_err(|e| ConfigError::io(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| ConfigError::io(path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decided_history == 0 {
            return Err(ConfigError::Validation(
                "decided_history: must be at least 1".to_string(),
            ));
        }
        self.approval.validate()
    }

    /// Apply `CI` / `PAR_AGENT_CI` / `PAR_AGENT_YOLO` from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let (ci, yolo) = resolve_modes(self.ci_mode, self.yolo_mode, lookup);
        if ci && !self.ci_mode {
            log::info!("CI mode enabled from environment");
        }
        if yolo && !self.yolo_mode {
            log::info!("YOLO mode enabled from environment");
        }
        self.ci_mode = ci;
        self.yolo_mode = yolo;
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(mut self) -> Self {
        self.apply_env_overrides(|k| std::env::var(k).ok());
        self
    }

    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags::new(self.ci_mode, self.yolo_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use par_agent_transcript::Category;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AgentClientConfig::default();
        assert_eq!(config.decided_history, 100);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.ci_mode);
        assert!(!config.yolo_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config =
            AgentClientConfig::parse("ci_mode: true\n", ConfigFormat::Yaml).unwrap();
        assert!(config.ci_mode);
        assert_eq!(config.decided_history, 100);
        assert!(config.approval.is_enabled(Category::FileRead));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = AgentClientConfig::parse("", ConfigFormat::Yaml).unwrap();
        assert_eq!(config, AgentClientConfig::default());
    }

    #[test]
    fn test_toml_config() {
        let toml_text = r#"
yolo_mode = true
log_level = "debug"

[approval.categories.shell_command]
enabled = true
allow_list = ["cargo test", "git status"]
deny_list = ["git push"]
"#;
        let config = AgentClientConfig::parse(toml_text, ConfigFormat::Toml).unwrap();
        assert!(config.yolo_mode);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.approval.is_enabled(Category::ShellCommand));
        assert_eq!(config.approval.deny_list(Category::ShellCommand), ["git push"]);
    }

    #[test]
    fn test_validation_rejects_zero_history() {
        let err = AgentClientConfig::parse("decided_history: 0\n", ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_yaml_is_yaml_error() {
        let err = AgentClientConfig::parse("ci_mode: [", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = AgentClientConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, AgentClientConfig::default());

        let reloaded = AgentClientConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_save_and_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AgentClientConfig::default();
        config.approval.categories.insert(
            Category::FileWrite,
            crate::CategoryPolicy::enabled().with_delay(3.0),
        );
        config.save_to(&path).unwrap();
        assert!(!dir.path().join("config.toml.tmp").exists());

        let reloaded = AgentClientConfig::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        assert!(matches!(
            AgentClientConfig::default().save_to(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            AgentClientConfig::load_from(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = AgentClientConfig::load_from(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AgentClientConfig::default();
        config.apply_env_overrides(|k| (k == "PAR_AGENT_YOLO").then(|| "1".to_string()));
        assert!(config.yolo_mode);
        assert!(!config.ci_mode);
        let flags = config.mode_flags();
        assert!(flags.yolo_mode());
    }

    #[test]
    fn test_config_path_under_par_agent_dir() {
        let path = AgentClientConfig::config_path();
        assert!(path.ends_with("config.yaml"));
        assert_eq!(
            path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()),
            Some("par-agent")
        );
    }
}
