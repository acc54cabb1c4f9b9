//! Controller configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use bcisignal::{FC_PORT, GUI_PORT};

/// Main controller configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network ports and buffers
    pub network: NetworkConfig,

    /// Stimulus timing defaults
    pub timing: TimingConfig,

    /// Handler lifecycle tuning
    pub lifecycle: LifecycleConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.network.port == self.network.gui_port {
            return Err(eyre::eyre!(
                "listen port and GUI port must differ (both are {})",
                self.network.port
            ));
        }
        if self.network.channel_capacity == 0 {
            return Err(eyre::eyre!("network.channel-capacity must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .feedbackd.yml
        let local_config = PathBuf::from(".feedbackd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/feedbackd/feedbackd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("feedbackd").join("feedbackd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Network ports and buffers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind the signal socket on
    pub host: String,

    /// UDP port for incoming signals
    pub port: u16,

    /// Port on the sender's host that replies are addressed to
    #[serde(rename = "gui-port")]
    pub gui_port: u16,

    /// Capacity of the decoded-signal queue between the socket and the
    /// dispatcher
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: FC_PORT,
            gui_port: GUI_PORT,
            channel_capacity: 64,
        }
    }
}

/// Stimulus timing defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Log per-presentation frame counts
    #[serde(rename = "print-frames")]
    pub print_frames: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { print_frames: false }
    }
}

/// Handler lifecycle tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long quit waits for a handler thread before detaching it, in
    /// milliseconds
    #[serde(rename = "stop-timeout-ms")]
    pub stop_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { stop_timeout_ms: 2_000 }
    }
}
