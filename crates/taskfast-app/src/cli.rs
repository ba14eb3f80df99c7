//! CLI argument definitions for the TaskFast server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// TaskFast - task list server with a conversational task agent.
#[derive(Parser, Debug)]
#[command(name = "taskfast", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", env = "TASKFAST_CONFIG")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", env = "TASKFAST_PORT")]
    pub port: Option<u16>,

    /// Directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir", env = "TASKFAST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Insert the welcome tasks when the store is empty.
    #[arg(long = "seed")]
    pub seed: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TASKFAST_CONFIG > ~/.taskfast/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > TASKFAST_PORT > config file value > 5000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        match (self.port, config_port) {
            (Some(p), _) => p,
            (None, 0) => 5000,
            (None, p) => p,
        }
    }

    /// Data directory override, if one was given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level: --log-level flag > config file value > "info".
    pub fn resolve_log_level(&self, config_level: Option<&str>) -> String {
        self.log_level
            .as_deref()
            .or(config_level)
            .filter(|l| !l.trim().is_empty())
            .unwrap_or("info")
            .to_string()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".taskfast").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".taskfast").join("config.toml");
    }
    PathBuf::from("config.toml")
}
