//! Configuration for the par-agent client.
//!
//! - [`policy`] - per-category auto-approval policy and the shared [`PolicyHandle`]
//! - [`config`] - [`AgentClientConfig`] file loading and saving (YAML or TOML)
//! - [`modes`] - CI / YOLO flags and their environment overrides
//! - [`watcher`] - hot reload of the policy when the file changes

pub mod config;
pub mod defaults;
pub mod error;
pub mod modes;
pub mod policy;
mod types;
#[cfg(feature = "watcher")]
pub mod watcher;

pub use config::AgentClientConfig;
pub use error::ConfigError;
pub use modes::{ModeFlags, resolve_modes};
pub use policy::{ApprovalPolicy, CategoryPolicy, PolicyHandle};
pub use types::{ConfigFormat, LogLevel};
#[cfg(feature = "watcher")]
pub use watcher::{PolicyReloadEvent, PolicyWatcher, load_policy, reload_policy};
