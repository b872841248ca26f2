//! CLI argument definitions for the Quorum server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Quorum - document question answering for chat and meeting calls.
#[derive(Parser, Debug)]
#[command(name = "quorum", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Directory uploaded documents are saved to.
    #[arg(short = 'u', long = "upload-dir")]
    pub upload_dir: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > QUORUM_CONFIG env var > ~/.quorum/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("QUORUM_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// `config_port` already carries any QUORUM_PORT override.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        8000
    }

    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    pub fn resolve_upload_dir(&self) -> Option<String> {
        self.upload_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".quorum").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".quorum").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "quorum",
            "--config",
            "/tmp/q.toml",
            "-p",
            "9000",
            "--log-level",
            "debug",
            "--upload-dir",
            "/tmp/uploads",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/q.toml"));
        assert_eq!(args.resolve_port(8000), 9000);
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert_eq!(args.resolve_upload_dir().as_deref(), Some("/tmp/uploads"));
    }

    #[test]
    fn test_defaults_fall_through_to_config() {
        let args = CliArgs::parse_from(["quorum"]);
        assert_eq!(args.resolve_port(8123), 8123);
        assert_eq!(args.resolve_port(0), 8000);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert!(args.resolve_upload_dir().is_none());
    }
}
