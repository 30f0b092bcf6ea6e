//! Application configuration.
//!
//! Loaded from a TOML file; every section and field falls back to its default
//! so a partial file is enough.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use cobotlink_control::ControlConfig;
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cobotlink.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Robot controller address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default = "default_robot_host")]
    pub host: String,
    /// RTDE port on the controller
    #[serde(default = "default_robot_port")]
    pub port: u16,
}

/// Persisted run/stop status flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Status file polled for a stop request, `None` disables polling
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Simulated driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// How long each simulated move takes
    #[serde(default = "default_move_duration_ms")]
    pub move_duration_ms: u64,
}

fn default_robot_host() -> String { "127.0.0.1".to_string() }
fn default_robot_port() -> u16 { 30004 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_move_duration_ms() -> u64 { 2000 }

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            host: default_robot_host(),
            port: default_robot_port(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            move_duration_ms: default_move_duration_ms(),
        }
    }
}

impl StatusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl AppConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("In config file {}", path.display()))
    }

    /// Load `path` if given, otherwise the default file if it exists,
    /// otherwise built-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// `host:port` of the robot controller.
    pub fn robot_address(&self) -> String {
        format!("{}:{}", self.robot.host, self.robot.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.robot_address(), "127.0.0.1:30004");
        assert_eq!(config.status.path, None);
        assert_eq!(config.status.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.simulator.move_duration_ms, 2000);
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [robot]
            host = "10.0.0.20"

            [status]
            path = "/var/lib/cobotlink/status.toml"
            "#,
        )
        .unwrap();

        assert_eq!(config.robot.host, "10.0.0.20");
        assert_eq!(config.robot.port, 30004);
        assert_eq!(
            config.status.path.as_deref(),
            Some(Path::new("/var/lib/cobotlink/status.toml"))
        );
        assert_eq!(config.control, ControlConfig::default());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[robot]\nport = \"not a port\"").unwrap();

        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let err = AppConfig::resolve(Some(Path::new("/nonexistent/cobotlink.toml")));
        assert!(err.is_err());
    }
}
