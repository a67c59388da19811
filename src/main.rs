//! # DualSense Manager
//!
//! Supervises DualSense controllers: battery LEDs, charging animations and
//! automatic Bluetooth disconnect of idle controllers.
//!
//! The binary wires the library to the real system: sysfs for discovery,
//! battery and LEDs, `/dev/input/js*` for input, BlueZ for disconnects.
//! Everything else lives in the `dualsense_manager` library.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use dualsense_manager::bluetooth::BluezBridge;
use dualsense_manager::config::Config;
use dualsense_manager::controller::input::DeviceFiles;
use dualsense_manager::events::{self, EventReceiver};
use dualsense_manager::manager::ControllerManager;
use dualsense_manager::shutdown;
use dualsense_manager::sysfs::SysFs;

/// File name prefix of the rolling log files
const LOG_FILE_PREFIX: &str = "dualsense-manager.log";

/// Supervise DualSense controllers on Linux
#[derive(Parser, Debug)]
#[command(name = "dualsense-manager", version, about)]
struct Cli {
    /// Configuration file [default: $XDG_CONFIG_HOME/dualsense-manager/config.toml]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

/// Main entry point
///
/// # Control Flow
///
/// 1. Parse arguments, set up logging
/// 2. Load the configuration, writing defaults on first start
/// 3. Run the controller manager until Ctrl+C or SIGTERM
/// 4. Reload the configuration on SIGHUP
/// 5. Cancel and join every controller session
///
/// # Errors
///
/// Returns error if the configuration directory cannot be written or the
/// signal handlers cannot be installed.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli);

    info!("DualSense Manager v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_init(&config_path)
        .with_context(|| format!("Failed to initialize configuration at {}", config_path.display()))?;
    info!("Using configuration {}", config_path.display());

    let (events_tx, events_rx) = events::channel();
    let printer = tokio::spawn(print_events(events_rx, cli.json));

    let (config_tx, config_rx) = watch::channel(config.clone());
    let (trigger, shutdown) = shutdown::channel();

    let manager = ControllerManager::new(
        config,
        Arc::new(SysFs),
        Arc::new(BluezBridge::default()),
        Arc::new(DeviceFiles),
        events_tx,
    );
    let manager_task = tokio::spawn(manager.run(shutdown, config_rx));

    let signals = wait_for_signals(&config_path, &config_tx).await;

    trigger.trigger();
    manager_task.await.context("Controller manager panicked")?;
    printer.await.context("Event printer panicked")?;
    signals?;

    info!("Shutdown complete");
    Ok(())
}

/// Install the tracing subscriber
///
/// Logs go to stderr when events are printed as JSON, so stdout stays
/// machine-readable. The returned guard flushes the writer on drop.
fn init_logging(cli: &Cli) -> WorkerGuard {
    let (writer, guard) = match (&cli.log_dir, cli.json) {
        (Some(dir), _) => tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX)),
        (None, true) => tracing_appender::non_blocking(std::io::stderr()),
        (None, false) => tracing_appender::non_blocking(std::io::stdout()),
    };

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(writer)
        .with_ansi(cli.log_dir.is_none())
        .init();

    guard
}

/// Forward events to the log or to stdout until every sender is gone
async fn print_events(mut events: EventReceiver, json: bool) {
    while let Some(event) = events.recv().await {
        if !json {
            event.log();
            continue;
        }

        match event.to_json_line() {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
    }
}

/// Block until a termination signal, reloading the config on SIGHUP
async fn wait_for_signals(config_path: &Path, config_tx: &watch::Sender<Config>) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down...");
                return Ok(());
            }
            _ = hangup.recv() => {
                reload_config(config_path, config_tx);
            }
        }
    }
}

/// Re-read the configuration file and publish it; a bad file is ignored
///
/// Returns whether a new configuration was published.
fn reload_config(config_path: &Path, config_tx: &watch::Sender<Config>) -> bool {
    match Config::load(config_path) {
        Ok(config) => {
            info!("Reloaded configuration from {}", config_path.display());
            config_tx.send_replace(config);
            true
        }
        Err(e) => {
            warn!("Keeping current configuration, {} is invalid: {}", config_path.display(), e);
            false
        }
    }
}
