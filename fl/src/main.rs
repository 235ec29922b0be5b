//! Flitter - referee-coordinated worker directory
//!
//! CLI entry point for running a referee, a worker, or a one-shot lookup.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{error, info, warn};

use flitter::cli::{BusyState, Cli, Command, get_log_dir};
use flitter::config::Config;
use flitter::node::{NodeInfo, NodePath};
use flitter::referee::Referee;
use flitter::report::Reporter;
use flitter::service::NameService;
use flitter::transport::{RefereeClient, WorkerEndpoint};

fn setup_logging(verbose: bool, role: &str) -> Result<()> {
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to a per-role log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("flitter-{role}.log")))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {}, role: {})", verbose, role);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.command.role()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("Flitter loaded config: referee={}", config.referee.path);

    let result = match cli.command {
        Command::Referee { path } => cmd_referee(&config, path).await,
        Command::Worker { path, referee, wait } => cmd_worker(&config, &path, referee.as_deref(), wait).await,
        Command::Lookup { group, index, referee } => cmd_lookup(&config, &group, index, referee.as_deref()).await,
        Command::Busy { state, referee } => cmd_busy(&config, state, referee.as_deref()).await,
    };

    if let Err(e) = &result {
        error!("Fatal: {:?}", e);
    }
    result
}

/// Resolve a referee argument given as `host:port` or as a node path
fn resolve_referee(config: &Config, arg: Option<&str>) -> Result<NodeInfo> {
    let raw = arg.unwrap_or(&config.referee.path);
    NodeInfo::parse(raw)
        .or_else(|| NodePath::from(raw).node_info())
        .ok_or_else(|| eyre!("Invalid referee address: {}", raw))
}

/// Run a referee hosting the name service until interrupted
async fn cmd_referee(config: &Config, path: Option<String>) -> Result<()> {
    let path = NodePath::from(path.unwrap_or_else(|| config.referee.path.clone()));

    let (reporter, drain) = Reporter::from_config(&config.reporter);
    let drain_task = tokio::spawn(drain.run());

    let mut referee = Referee::new(path, config, reporter.clone()).context("Failed to create referee")?;
    referee.config_service(Arc::new(NameService::new(config, reporter.clone())));

    let listener = referee.bind().await.context("Failed to bind referee listener")?;
    println!("{} Referee {} listening", "✓".green(), referee.path().to_string().cyan());
    info!(path = %referee.path(), "Referee listening");

    referee
        .run(listener, shutdown_signal())
        .await
        .context("Referee stopped with error")?;

    drop(reporter);
    if tokio::time::timeout(Duration::from_secs(1), drain_task).await.is_err() {
        warn!("Report drain did not finish in time");
    }
    println!("{} Referee stopped", "✓".green());
    Ok(())
}

/// Register a worker, then log peer messages until interrupted
async fn cmd_worker(config: &Config, path: &str, referee: Option<&str>, wait: u64) -> Result<()> {
    let referee = resolve_referee(config, referee)?;
    let path = NodePath::from(path);
    let path = path
        .canonical()
        .ok_or_else(|| eyre!("Invalid worker path: {}", path))?;

    let endpoint = WorkerEndpoint::bind(path, &config.transport)
        .await
        .context("Failed to bind worker listener")?;
    let client = RefereeClient::new(referee.clone(), &config.transport);

    println!(
        "{} Registering {} with referee {}",
        "→".blue(),
        endpoint.path().to_string().cyan(),
        referee
    );
    let canonical = endpoint
        .register_and_wait(&client, Duration::from_secs(wait))
        .await
        .context("Registration failed")?;
    println!("{} Registered as {}", "✓".green(), canonical.to_string().cyan());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = endpoint.accept_message() => match received {
                Ok(Some(msg)) => {
                    info!(%msg, "Peer message received");
                    println!("{} {}", "←".blue(), msg);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to read peer message"),
            },
        }
    }

    println!("{} Worker stopped", "✓".green());
    Ok(())
}

/// Ask the referee for one group member's address
async fn cmd_lookup(config: &Config, group: &str, index: usize, referee: Option<&str>) -> Result<()> {
    let referee = resolve_referee(config, referee)?;
    let client = RefereeClient::new(referee, &config.transport);

    let address = client
        .refer_address(group, index)
        .await
        .context("Lookup request failed")?;

    if address == config.name.busy_reply {
        println!("{} Referee is busy, try again later", "!".yellow());
    } else if address.is_empty() {
        println!("{} No member #{} in group {}", "✗".red(), index, group.cyan());
    } else {
        println!("{}", address);
    }
    Ok(())
}

/// Flip the referee's busy gate
async fn cmd_busy(config: &Config, state: BusyState, referee: Option<&str>) -> Result<()> {
    let referee = resolve_referee(config, referee)?;
    let client = RefereeClient::new(referee.clone(), &config.transport);

    let busy = client
        .set_busy(state.is_on())
        .await
        .context("Busy request failed")?;

    if busy {
        println!("{} Referee {} is busy", "!".yellow(), referee);
    } else {
        println!("{} Referee {} is accepting lookups", "✓".green(), referee);
    }
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut sigint), Ok(mut sigterm)) = (signal(SignalKind::interrupt()), signal(SignalKind::terminate()))
        else {
            error!("Failed to install signal handlers");
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    }
}
