//! blocwatch CLI - runs the analyzer in watch mode and prints diagnostics.
//!
//! ```text
//! main() -> init tracing -> load config -> WatchSession::start(root) -> wait for Ctrl-C or analyzer exit
//!                                   |
//!                                   v
//!                  PrintingSink (stdout)   TerminalNotifier (stderr)
//! ```

mod terminal;

use std::{
    env,
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use blocwatch_config::BlocwatchConfig;
use blocwatch_watch::{StopReason, WatchSession, Workspace};

use crate::terminal::{PrintingSink, TerminalNotifier};

/// Watch a project with an external analyzer and print its diagnostics.
#[derive(Debug, Parser)]
#[command(name = "blocwatch", version, about)]
struct Args {
    /// Directory to analyze.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Config file (default: ~/.blocwatch/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analyzer executable, overriding the config file.
    #[arg(long)]
    command: Option<String>,

    /// Analyzer entrypoint, overriding the config file.
    #[arg(long)]
    entrypoint: Option<PathBuf>,

    /// Display name for progress and diagnostic source.
    #[arg(long)]
    name: Option<String>,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber with the `RUST_LOG` filter (default `info`).
///
/// Runs before the config file is read so config loading is logged; the
/// returned handle swaps in the configured filter afterwards.
fn init_tracing() -> FilterHandle {
    let default = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(default);

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return handle;
    }

    // No log file: stderr, which carries progress lines anyway.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
    handle
}

/// Filter from the config file. `RUST_LOG` wins when set.
fn configured_filter(rust_log_set: bool, configured: Option<&str>) -> Option<EnvFilter> {
    if rust_log_set {
        return None;
    }
    let directives = configured?;
    match EnvFilter::try_new(directives) {
        Ok(filter) => Some(filter),
        Err(e) => {
            tracing::warn!("Ignoring invalid log filter {directives:?}: {e}");
            None
        }
    }
}

fn apply_log_filter(handle: &FilterHandle, configured: Option<&str>) {
    let rust_log_set = env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let Some(filter) = configured_filter(rust_log_set, configured) else {
        return;
    };
    let directives = filter.to_string();
    match handle.reload(filter) {
        Ok(()) => tracing::debug!(filter = %directives, "Applied configured log filter"),
        Err(e) => tracing::warn!("Failed to apply log filter: {e}"),
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.blocwatch/logs/blocwatch.log
    if let Some(dir) = BlocwatchConfig::dir() {
        candidates.push(dir.join("logs").join("blocwatch.log"));
    }

    // Fallback: ./.blocwatch/logs/blocwatch.log
    candidates.push(PathBuf::from(".blocwatch").join("logs").join("blocwatch.log"));

    candidates
}

fn load_config(args: &Args) -> Result<BlocwatchConfig> {
    let mut config = match &args.config {
        Some(path) => BlocwatchConfig::load_from(path)?,
        None => BlocwatchConfig::load()?,
    };

    let analyzer = &mut config.analyzer;
    if let Some(command) = &args.command {
        analyzer.command.clone_from(command);
    }
    if let Some(entrypoint) = &args.entrypoint {
        analyzer.entrypoint = Some(entrypoint.clone());
    }
    if let Some(name) = &args.name {
        analyzer.name.clone_from(name);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = init_tracing();
    let config = load_config(&args)?;
    apply_log_filter(&filter, config.log.as_ref().and_then(|l| l.filter.as_deref()));

    let sink = Arc::new(PrintingSink::new());
    let session = WatchSession::start(
        &config.analyzer,
        &args.root,
        Arc::new(Workspace::new()),
        sink.clone(),
        Arc::new(TerminalNotifier::new()),
    )
    .await
    .with_context(|| format!("starting {}", config.analyzer.name))?;

    let stop = tokio::select! {
        reason = session.stopped() => Some(reason),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!("Failed to listen for Ctrl-C: {e}");
            }
            None
        }
    };

    let summary = sink.store().snapshot().status_string();
    match stop {
        None => {
            session.shutdown().await;
            if !summary.is_empty() {
                eprintln!("{summary}");
            }
            Ok(())
        }
        Some(StopReason::Shutdown) => Ok(()),
        Some(reason) => bail!("{} {reason}", config.analyzer.name),
    }
}
