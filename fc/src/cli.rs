//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Feedback controller - networked stimulus-presentation daemon
#[derive(Parser)]
#[command(
    name = "fc",
    about = "Networked stimulus-presentation controller",
    version,
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// UDP port to listen on, overriding the config file
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the controller daemon (default)
    Run,

    /// List the built-in feedbacks
    Feedbacks,

    /// Send an interaction command to a running controller
    Send {
        /// Command token (play, pause, stop, quit, send_init, ...)
        #[arg(value_name = "COMMAND")]
        command: String,

        /// Target controller address
        #[arg(short, long)]
        to: Option<SocketAddr>,

        /// Additional string data entries as key=value
        #[arg(short, long, value_name = "KEY=VALUE")]
        data: Vec<String>,
    },
}

/// Split a `key=value` CLI argument.
pub fn parse_data_entry(entry: &str) -> Option<(&str, &str)> {
    entry.split_once('=')
}
