//! trackdrop - drop-folder intake service entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackdrop::services::ledger::Ledger;
use trackdrop::services::processor::Processor;
use trackdrop::services::scanner::Scanner;
use trackdrop::services::{poller, watcher};
use trackdrop::Policy;

#[derive(Parser, Debug)]
#[command(name = "trackdrop")]
#[command(about = "Drop-folder intake service for audio files")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "trackdrop.toml", env = "TRACKDROP_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the intake service (default)
    Run {
        /// React to filesystem events instead of polling
        #[arg(long)]
        watch: bool,
    },
    /// Validate the configuration and preview discovery
    Check,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackdrop=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command.unwrap_or(Command::Run { watch: false }) {
        Command::Run { watch } => run(&args.config, watch).await,
        Command::Check => check(&args.config),
        Command::Init { force } => init(&args.config, force),
    }
}

async fn run(config_path: &PathBuf, watch: bool) -> Result<()> {
    let mut policy = Policy::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    policy
        .ensure_directories()
        .context("creating service directories")?;

    info!("trackdrop starting (v{})", env!("CARGO_PKG_VERSION"));
    info!(base = %policy.base_path.display(), "watched root");
    info!(local = %policy.local_path.display(), "local destination");
    if policy.include_share {
        if let Some(network) = &policy.network_path {
            info!(network = %network.display(), "network share enabled");
        }
    }
    info!(
        driver = if watch { "events" } else { "polling" },
        "scheduling mode"
    );

    let policy = Arc::new(policy);
    let ledger =
        Arc::new(Ledger::open(&policy.base_path).context("opening the dedup ledger")?);
    let processor = Arc::new(Processor::new(Arc::clone(&policy), Arc::clone(&ledger)));

    // Initial full pass runs synchronously in both modes; failure to
    // enumerate the watched root here is the one fatal pipeline error.
    processor
        .run_cycle()
        .context("initial scan of the watched root failed")?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    if watch {
        watcher::run(processor, policy, ledger, shutdown).await?;
    } else {
        poller::run(processor, policy, shutdown).await?;
    }

    info!("trackdrop stopped");
    Ok(())
}

fn check(config_path: &PathBuf) -> Result<()> {
    let policy = Policy::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    println!("Configuration OK: {}", config_path.display());
    println!("  watched root:      {}", policy.base_path.display());
    println!("  local destination: {}", policy.local_path.display());
    match (policy.include_share, &policy.network_path) {
        (true, Some(network)) => println!("  network share:     {}", network.display()),
        _ => println!("  network share:     disabled"),
    }
    println!(
        "  bpm range:         {}-{}",
        policy.bpm_range.min, policy.bpm_range.max
    );
    println!("  extensions:        {}", policy.supported_extensions.join(", "));

    if !policy.base_path.exists() {
        println!("  note: watched root does not exist yet");
        return Ok(());
    }
    let files = Scanner::new(&policy)
        .scan(&policy.base_path)
        .context("scanning the watched root")?;
    println!("  pending files:     {}", files.len());
    Ok(())
}

fn init(config_path: &PathBuf, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    let default = toml::to_string_pretty(&Policy::default())
        .context("serializing default configuration")?;
    std::fs::write(config_path, default)
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
