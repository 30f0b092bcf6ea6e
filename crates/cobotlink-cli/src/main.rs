//! Command-line entry point for the CobotLink control service.
//!
//! Reads JSON command lines on stdin, drives the control session and writes
//! one JSON response per line on stdout. Logs go to stderr.

mod config;
mod status;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cobotlink_control::{CommandRouter, ControlEventBus, ControlSession, SimulatedConnector};
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::config::AppConfig;

/// CobotLink - collaborative robot control session.
#[derive(Parser, Debug)]
#[command(name = "cobotlink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ./cobotlink.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot controller host.
    #[arg(long)]
    host: Option<String>,

    /// Robot controller port.
    #[arg(long)]
    port: Option<u16>,

    /// Status file polled for a stop request.
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Duration of each simulated move in milliseconds.
    #[arg(long)]
    move_duration_ms: Option<u64>,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.robot.host = host.clone();
        }
        if let Some(port) = self.port {
            config.robot.port = port;
        }
        if let Some(path) = &self.status_file {
            config.status.path = Some(path.clone());
        }
        if let Some(ms) = self.move_duration_ms {
            config.simulator.move_duration_ms = ms;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = AppConfig::resolve(args.config.as_deref())?;
    args.apply(&mut config);

    // Command reception is a single cooperative context; motion runs on the
    // blocking pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let result = runtime.block_on(run(config));
    // A stdin read may still be parked on a blocking thread after a stop
    // request; the session is already torn down, so don't wait for it.
    runtime.shutdown_background();
    result
}

fn init_logging(verbose: bool) {
    // JSON format for production/container environments
    let json_logging = std::env::var("COBOTLINK_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "cobotlink=debug" } else { "cobotlink=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let address = config.robot_address();
    info!(robot = %address, "Starting CobotLink control service");

    let connector = Arc::new(SimulatedConnector::new(
        address,
        Duration::from_millis(config.simulator.move_duration_ms),
    ));
    let events = Arc::new(ControlEventBus::new(
        config.control.event_capacity,
        config.control.max_stored_events,
    ));
    let session = Arc::new(ControlSession::new(connector, events));
    let router = Arc::new(CommandRouter::new(session));

    let status_path = config.status.path.clone();
    let poll_interval = config.status.poll_interval();
    let stop = async move {
        let status_stop = async {
            match status_path {
                Some(path) => status::wait_for_stop(path, poll_interval).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = status_stop => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                info!("Interrupted");
            }
        }
    };

    let served = transport::serve(
        router.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        stop,
    )
    .await;

    // Tear the session down even if the transport failed
    let torn_down = router
        .shutdown()
        .await
        .context("Failed to disable control session")?;
    if torn_down {
        info!("Control session disabled");
    }
    served?;

    info!("CobotLink control service stopped");
    Ok(())
}
