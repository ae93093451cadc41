//! # FPV Vision Router
//!
//! Arbitrate FPV drone control between a physical joystick and a
//! vision-guidance UDP stream.
//!
//! Subcommands:
//! - `route` (default): run the control router
//! - `send`: forward a local joystick to a remote router over UDP
//! - `monitor`: print joystick events arriving on a UDP port

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use fpv_vision_router::config::Config;
use fpv_vision_router::error::RouterError;
use fpv_vision_router::event::protocol::DEFAULT_EVENT_PORT;
use fpv_vision_router::input::device::JoystickDevice;
use fpv_vision_router::input::{forward, physical, vision};
use fpv_vision_router::net::receiver::EventReceiver;
use fpv_vision_router::net::sink::OutputSink;
use fpv_vision_router::router::liveness::RouterStatus;
use fpv_vision_router::router::runner::RouterLoop;

/// Config file used when `--config` is not given and the file exists
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default destination for `send`, the router's UDP physical port
const DEFAULT_FORWARD_PORT: u16 = 5007;

#[derive(Parser, Debug)]
#[command(name = "fpv-vision-router", version, about = "Route FPV control between a joystick and vision guidance")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the control router (default)
    Route {
        /// Joystick device path (evdev backend)
        #[arg(long, value_name = "PATH")]
        device: Option<String>,

        /// Output destination host
        #[arg(long)]
        output_host: Option<String>,

        /// Output destination port
        #[arg(long)]
        output_port: Option<u16>,

        /// Vision listen port
        #[arg(long)]
        vision_port: Option<u16>,
    },

    /// Forward a local joystick to a remote router
    Send {
        /// Joystick device path (auto-detect if omitted)
        #[arg(long, value_name = "PATH")]
        device: Option<String>,

        /// Destination host
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Destination port
        #[arg(long, default_value_t = DEFAULT_FORWARD_PORT)]
        port: u16,

        /// Full-state resend period in milliseconds
        #[arg(long, default_value_t = 100)]
        keepalive_ms: u64,
    },

    /// Print joystick events arriving on a UDP port
    Monitor {
        /// Listen host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port
        #[arg(long, default_value_t = DEFAULT_EVENT_PORT)]
        port: u16,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Route {
            device: None,
            output_host: None,
            output_port: None,
            vision_port: None,
        }
    }
}

/// Main entry point for FPV Vision Router
///
/// # Control Flow
///
/// 1. Set up non-blocking console logging
/// 2. Load and validate configuration
/// 3. Run the selected subcommand until Ctrl+C (or, for `route`, until the
///    router reports a fatal status)
///
/// # Errors
///
/// Returns error if:
/// - Configuration is invalid
/// - A socket or the joystick cannot be opened at startup
/// - The physical input is lost while routing
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.quiet);

    info!("FPV Vision Router v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or_default() {
        Command::Route {
            device,
            output_host,
            output_port,
            vision_port,
        } => {
            if let Some(device) = device {
                config.physical.device_path = device;
            }
            if let Some(host) = output_host {
                config.output.host = host;
            }
            if let Some(port) = output_port {
                config.output.port = port;
            }
            if let Some(port) = vision_port {
                config.vision.bind_port = port;
            }
            config.validate().context("Invalid configuration after overrides")?;
            route(config).await
        }
        Command::Send {
            device,
            host,
            port,
            keepalive_ms,
        } => {
            let device = device.or_else(|| Some(config.physical.device_path.clone()).filter(|p| !p.is_empty()));
            send(&config, device.as_deref(), &host, port, Duration::from_millis(keepalive_ms.max(1))).await
        }
        Command::Monitor { host, port } => monitor(&host, port).await,
    }
}

/// Install the console subscriber; the guard must live until exit
fn init_logging(quiet: bool) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let level = if quiet { tracing::Level::WARN } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    guard
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let config = Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))?;
            info!("Loaded configuration from {}", DEFAULT_CONFIG_PATH);
            Ok(config)
        }
        None => {
            info!("No configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

/// Cancel `token` on the first Ctrl+C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                token.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });
}

async fn route(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let sink = OutputSink::connect(&config.output.host, config.output.port, config.output.send_timeout())
        .await
        .context("Cannot open output sink")?;
    let physical = physical::spawn(&config, cancel.clone())
        .await
        .context("Cannot start physical input")?;
    let vision = vision::spawn(&config.vision, cancel.clone())
        .await
        .context("Cannot start vision input")?;

    let (router_loop, mut status) = RouterLoop::new(&config, sink, physical.reader(), vision.reader());
    let loop_task = tokio::spawn(router_loop.run(cancel.clone()));

    cancel_on_ctrl_c(cancel.clone());
    info!("Press Ctrl+C to exit");

    let outcome = tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        fatal = status.wait_for(RouterStatus::is_fatal) => match fatal.map(|s| *s) {
            Ok(RouterStatus::PhysicalLost { age }) => {
                error!("Physical input lost, halting");
                Err(anyhow::Error::new(RouterError::PhysicalInputLost(age)))
            }
            Ok(other) => Err(anyhow!("Router halted: {}", other)),
            Err(_) => Err(anyhow!("Router loop ended unexpectedly")),
        },
    };

    cancel.cancel();
    let summary = loop_task.await.context("Router loop panicked")?;
    physical.join().await;
    vision.join().await;

    info!(
        "Total: {} ticks, {} frames sent, {} dropped, {} deadlines missed",
        summary.ticks, summary.frames_sent, summary.send_failures, summary.missed_ticks
    );
    outcome
}

async fn send(config: &Config, device: Option<&str>, host: &str, port: u16, keepalive: Duration) -> Result<()> {
    let device = JoystickDevice::open(device).context("Cannot open joystick")?;
    info!("Sending joystick from {} to {}:{} (Ctrl+C to stop)", device.device_path(), host, port);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let stats = forward::forward_device(device, host, port, keepalive, config.output.send_timeout(), cancel).await?;
    info!(
        "Total: {} events, {} keepalives, {} failed sends",
        stats.events, stats.keepalives, stats.failures
    );
    Ok(())
}

async fn monitor(host: &str, port: u16) -> Result<()> {
    let mut receiver = EventReceiver::bind(host, port, "monitor")
        .await
        .with_context(|| format!("Cannot listen on {}:{}", host, port))?;
    info!("Listening for joystick events on {}:{} (Ctrl+C to stop)", host, port);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = receiver.recv_event() => received,
        };

        match received {
            Ok(Some((event, from))) => info!(
                "[{}] Time: {:>8} | {} | Number: {:>2} | Value: {:>6}",
                from,
                event.time,
                event.kind.label(),
                event.number,
                event.value
            ),
            Ok(None) => {}
            Err(e) => warn!("Receive failed: {}", e),
        }
    }

    let stats = receiver.stats();
    info!("Received {} malformed datagrams", stats.malformed);
    Ok(())
}
