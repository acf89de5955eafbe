//! Command-line interface for par-agent.
//!
//! `replay` runs a recorded agent feed through a live session; the `policy`
//! subcommands inspect and initialise the config file.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use par_agent_config::{AgentClientConfig, ConfigFormat, LogLevel};

/// par-agent - transcript and approval engine for a terminal AI agent client
#[derive(Parser, Debug)]
#[command(name = "par-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/par-agent/config.yaml; `.toml` for TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines agent feed through a session
    Replay(ReplayArgs),

    /// Inspect or create the config file
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReplayArgs {
    /// Feed file, or `-` for stdin
    #[arg(value_name = "FEED")]
    pub feed: PathBuf,

    /// Never ask: decide every request from policy alone
    #[arg(long)]
    pub ci: bool,

    /// Approve every request immediately
    #[arg(long)]
    pub yolo: bool,

    /// Mirror output to this file
    #[arg(long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,

    /// Write dispatched responses as JSON lines here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub responses: Option<PathBuf>,

    /// Reload the approval policy when the config file changes
    #[arg(long)]
    pub watch_policy: bool,
}

#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    /// Print the effective configuration
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Toml,
}

impl From<OutputFormat> for ConfigFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => ConfigFormat::Yaml,
            OutputFormat::Toml => ConfigFormat::Toml,
        }
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::parse(s).ok_or_else(|| {
        format!("unknown log level '{s}' (expected off, error, warn, info, debug or trace)")
    })
}

/// Runtime options passed from CLI to the replay run
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    pub config_path: PathBuf,
    pub log_level: Option<LogLevel>,
    pub replay: ReplayArgs,
}

/// Result of CLI processing
pub enum CliResult {
    /// Continue with a replay run
    Continue(RuntimeOptions),
    /// Exit with the given code (subcommand completed)
    Exit(i32),
}

/// Process CLI arguments and handle subcommands
pub fn process_cli() -> CliResult {
    process(Cli::parse())
}

/// Handle already-parsed arguments.
pub fn process(cli: Cli) -> CliResult {
    let config_path = cli
        .config
        .unwrap_or_else(AgentClientConfig::config_path);

    match cli.command {
        Commands::Replay(replay) => CliResult::Continue(RuntimeOptions {
            config_path,
            log_level: cli.log_level,
            replay,
        }),
        Commands::Policy { action } => {
            let result = match action {
                PolicyAction::Show { format } => show_policy(&config_path, format.into())
                    .map(|text| print!("{text}")),
                PolicyAction::Init { force } => init_policy(&config_path, force).map(|()| {
                    println!("Wrote default config to {}", config_path.display());
                }),
            };
            match result {
                Ok(()) => CliResult::Exit(0),
                Err(e) => {
                    eprintln!("par-agent: error: {e:#}");
                    CliResult::Exit(1)
                }
            }
        }
    }
}

/// Render the config at `path` (defaults if the file does not exist), with
/// environment overrides applied.
pub fn show_policy(path: &Path, format: ConfigFormat) -> anyhow::Result<String> {
    let config = if path.exists() {
        AgentClientConfig::load_from(path)?
    } else {
        AgentClientConfig::default()
    };
    Ok(config.with_process_env().render(format)?)
}

/// Write the default config to `path`. Refuses to overwrite unless `force`.
pub fn init_policy(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    AgentClientConfig::default().save_to(path)?;
    Ok(())
}
