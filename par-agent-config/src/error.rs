//! Typed error variants for the par-agent-config crate.
//!
//! Callers that only want a message can use `Display`; callers that need to
//! react to a specific failure (for example falling back to defaults on a
//! parse error) match on the variant.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    #[error("I/O error on config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file contained invalid YAML.
    #[error("YAML parse error in config: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// The config file contained invalid TOML.
    #[error("TOML parse error in config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The config could not be rendered as TOML.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A field value failed semantic validation.
    ///
    /// The inner string names the field and the reason.
    #[error("Config validation error: {0}")]
    Validation(String),

    /// The file extension is not one of the supported formats.
    #[error("Unsupported config format for '{}' (expected .yaml, .yml or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
