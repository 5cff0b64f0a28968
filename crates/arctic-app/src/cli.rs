//! CLI argument definitions for the Arctic Vision server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Arctic Vision - a web chat assistant backed by a hosted language model.
#[derive(Parser, Debug)]
#[command(name = "arctic-vision", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Path to the secret store (overrides `general.secrets_path`).
    #[arg(short = 's', long = "secrets")]
    pub secrets: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ARCTIC_CONFIG env var > ~/.arctic/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config_path_from(std::env::var("ARCTIC_CONFIG").ok())
    }

    fn config_path_from(&self, env_value: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env_value.filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the HTTP server port.
    ///
    /// Priority: --port flag > ARCTIC_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.port_from(std::env::var("ARCTIC_PORT").ok(), config_port)
    }

    fn port_from(&self, env_value: Option<String>, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        env_value
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    /// Resolve the secret store path.
    ///
    /// Priority: --secrets flag > config file value.
    pub fn resolve_secrets_path(&self, config_path: &str) -> PathBuf {
        match self.secrets {
            Some(ref p) => p.clone(),
            None => arctic_core::config::expand_home(config_path),
        }
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".arctic").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".arctic").join("config.toml");
    }
    PathBuf::from("config.toml")
}
