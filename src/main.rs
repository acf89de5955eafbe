use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use par_agent::cli::{self, RuntimeOptions};
use par_agent::dispatch::JsonLinesResponder;
use par_agent::replay::{self, ReplayReport};
use par_agent::transcript::{close_transcript, init_transcript, println_tee};
use par_agent::{SessionRuntime, SessionSettings};
use par_agent_config::AgentClientConfig;
use par_agent_config::defaults::watch_debounce_ms;
use tokio::io::AsyncWrite;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    // Process CLI arguments first (before logging init for cleaner output)
    let options = match cli::process_cli() {
        cli::CliResult::Exit(code) => {
            if code == 0 {
                return Ok(());
            }
            std::process::exit(code);
        }
        cli::CliResult::Continue(options) => options,
    };
    // CLI --log-level flag takes highest precedence, then RUST_LOG, then config (applied below).
    par_agent::debug::init_log_bridge(options.log_level);

    log::info!("Starting par-agent {}", par_agent::VERSION);

    let mut config = AgentClientConfig::load_or_create(&options.config_path)
        .with_context(|| format!("Failed to load {}", options.config_path.display()))?
        .with_process_env();
    par_agent::debug::apply_config_level(config.log_level);
    // Flags can only switch modes on.
    config.ci_mode |= options.replay.ci;
    config.yolo_mode |= options.replay.yolo;
    if config.yolo_mode {
        log::warn!("YOLO mode: every action request will be approved");
    }

    let runtime = Runtime::new()?;
    let result = runtime.block_on(replay_feed(&options, &config));
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    close_transcript();

    // Returned errors are printed once, by the `Result` from `main`.
    let report = result?;
    log::info!(
        "Replay finished: {} lines, {} responses",
        report.lines,
        report.responses.len()
    );
    Ok(())
}

fn read_feed(path: &Path) -> Result<Vec<replay::FeedEvent>> {
    let events = if path == Path::new("-") {
        replay::parse_feed(std::io::stdin().lock())
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open feed {}", path.display()))?;
        replay::parse_feed(BufReader::new(file))
    };
    Ok(events?)
}

async fn replay_feed(options: &RuntimeOptions, config: &AgentClientConfig) -> Result<ReplayReport> {
    let args = &options.replay;
    let events = read_feed(&args.feed)?;

    if let Some(path) = &args.transcript {
        init_transcript(path)
            .with_context(|| format!("Failed to open transcript {}", path.display()))?;
    }

    let writer: Box<dyn AsyncWrite + Send + Unpin> = match &args.responses {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let (mut runtime, notices) =
        SessionRuntime::spawn(SessionSettings::from_config(config), JsonLinesResponder::new(writer));
    if args.watch_policy {
        runtime.watch_policy(&options.config_path, watch_debounce_ms())?;
    }

    let report = replay::run_replay(events, runtime, notices, |line| {
        println_tee(format_args!("{line}"));
    })
    .await?;

    println_tee(format_args!("--- visible transcript ---"));
    for entry in &report.visible {
        println_tee(format_args!(
            "{} {} {}{}: {}",
            entry.timestamp,
            entry.category,
            if entry.is_action_request() { "?" } else { "-" },
            if entry.partial { " ..." } else { "" },
            entry.text
        ));
    }
    Ok(report)
}
