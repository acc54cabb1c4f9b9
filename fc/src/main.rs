//! fc - feedback controller daemon
//!
//! CLI entry point for running the controller and poking it over UDP.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use bcisignal::{FC_PORT, Signal, SignalKind, SignalTransport};
use feedbackd::cli::{Cli, Command, parse_data_entry};
use feedbackd::config::Config;
use feedbackd::dispatch::SignalDispatcher;
use feedbackd::feedback::FeedbackRegistry;
use feedbackd::lifecycle::HandlerManager;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedbackd")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > default (INFO)
    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file =
        fs::File::create(log_dir.join("feedbackd.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    config.validate()?;

    debug!("main: dispatching command");
    match cli.command {
        Some(Command::Feedbacks) => cmd_feedbacks(),
        Some(Command::Send { command, to, data }) => cmd_send(&config, &command, to, &data).await,
        Some(Command::Run) | None => cmd_run(&config).await,
    }
}

/// List the built-in feedbacks
fn cmd_feedbacks() -> Result<()> {
    let registry = FeedbackRegistry::with_builtins();
    println!("{}", "Available feedbacks:".bold());
    for name in registry.names() {
        println!("  {}", name.green());
    }
    Ok(())
}

/// Send one interaction signal to a running controller
async fn cmd_send(
    config: &Config,
    command: &str,
    to: Option<SocketAddr>,
    data: &[String],
) -> Result<()> {
    let target = to.unwrap_or_else(|| {
        format!("127.0.0.1:{}", config.network.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], FC_PORT)))
    });

    let mut signal = Signal::new(SignalKind::Interaction).with_command(command);
    for entry in data {
        let Some((key, value)) = parse_data_entry(entry) else {
            return Err(eyre::eyre!("data entry '{entry}' is not KEY=VALUE"));
        };
        signal = signal.with_data(key, value);
    }

    let transport = SignalTransport::bind("0.0.0.0:0").await;
    if transport.is_degraded() {
        return Err(eyre::eyre!("could not bind a local socket to send from"));
    }
    transport.send_signal(&signal, target).await;
    println!("Sent '{}' to {}", command.bold(), target);
    Ok(())
}

/// Run the controller main loop
async fn cmd_run(config: &Config) -> Result<()> {
    info!("Controller starting...");

    let bind_addr = format!("{}:{}", config.network.host, config.network.port);
    let transport = SignalTransport::bind(bind_addr.as_str()).await;
    match transport.local_addr() {
        Some(addr) => info!("Listening for signals on {addr}"),
        None => info!("Running without network; signals cannot be received"),
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel(config.network.channel_capacity);
    let recv_handle = transport.spawn_recv_loop(tx);

    let manager = HandlerManager::new(FeedbackRegistry::configured(&config.timing))
        .stop_timeout(Duration::from_millis(config.lifecycle.stop_timeout_ms));
    let mut dispatcher = SignalDispatcher::new(transport, manager, config.network.gui_port);

    info!("Controller running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = dispatcher.run(&mut rx) => {
            debug!("cmd_run: dispatcher exited");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    dispatcher.shutdown();
    recv_handle.abort();

    info!("Controller stopped");
    Ok(())
}
