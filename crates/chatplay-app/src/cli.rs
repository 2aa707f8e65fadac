//! CLI argument definitions for the chatplay binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;

/// chatplay: let chat viewers trigger configured actions.
#[derive(Parser, Debug)]
#[command(name = "chatplay", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Read chat from the console instead of a live connection.
    #[arg(long = "offline")]
    pub offline: bool,

    /// Replay chat lines (`user: text`) from a file, then exit.
    #[arg(long = "replay", value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long = "print-config")]
    pub print_config: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CHATPLAY_CONFIG env var > ~/.chatplay/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CHATPLAY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve offline mode.
    ///
    /// Priority: --offline flag > CHATPLAY_OFFLINE env var > config file value.
    pub fn resolve_offline(&self, config_offline: bool) -> Result<bool, String> {
        let env = std::env::var("CHATPLAY_OFFLINE").ok();
        resolve_offline_with(self.offline, env.as_deref(), config_offline)
    }

    /// Resolve the log filter used when `RUST_LOG` is unset.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn resolve_offline_with(flag: bool, env: Option<&str>, config_offline: bool) -> Result<bool, String> {
    if flag {
        return Ok(true);
    }
    match env {
        Some(value) => parse_bool(value).ok_or_else(|| {
            format!("Invalid CHATPLAY_OFFLINE value '{value}': expected true/false, 1/0, yes/no or y/n")
        }),
        None => Ok(config_offline),
    }
}

/// Truthy/falsy strings as accepted in environment variables.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".chatplay").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".chatplay").join("config.toml");
    }
    PathBuf::from("config.toml")
}
