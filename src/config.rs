//! Configuration system for tempsync
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TEMPSYNC_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values
//!
//! Only the plumbing around the protocol is configurable. Weights, tolerance
//! and the number of externals are protocol constants.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_PORT;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TempSyncConfig {
    /// Where the central listens and how externals reach it
    pub network: NetworkSettings,

    /// Protocol run settings
    pub protocol: ProtocolSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Host the central binds to and externals connect to
    pub host: String,

    /// TCP port of the central
    pub port: u16,

    /// How long an external keeps retrying before giving up, in milliseconds
    pub connect_timeout_ms: u64,

    /// First retry delay in milliseconds
    pub initial_retry_delay_ms: u64,

    /// Upper bound on the retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

/// Protocol run settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSettings {
    /// Give up after this many rounds without convergence (0 = never)
    pub max_rounds: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Rotation period for the log file: hourly, daily, never
    pub rotation: String,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 10_000,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 2_000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            rotation: "daily".to_string(),
            max_files: 5,
            json_format: false,
        }
    }
}

impl NetworkSettings {
    /// `host:port` of the central
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

impl TempSyncConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|source| Error::IoRead {
                path: path.clone(),
                source,
            })?;
            config = toml::from_str(&content).map_err(|source| Error::ConfigParse {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            Some(PathBuf::from("tempsync.toml")),
            dirs::config_dir().map(|p| p.join("tempsync").join("config.toml")),
            dirs::home_dir().map(|p| p.join(".tempsync").join("config.toml")),
            Some(PathBuf::from("/etc/tempsync/config.toml")),
        ];

        for path in search_paths.iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TEMPSYNC_HOST") {
            self.network.host = val;
        }
        if let Ok(val) = std::env::var("TEMPSYNC_PORT") {
            if let Ok(n) = val.parse() {
                self.network.port = n;
            }
        }
        if let Ok(val) = std::env::var("TEMPSYNC_CONNECT_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                self.network.connect_timeout_ms = n;
            }
        }

        if let Ok(val) = std::env::var("TEMPSYNC_MAX_ROUNDS") {
            if let Ok(n) = val.parse() {
                self.protocol.max_rounds = n;
            }
        }

        if let Ok(val) = std::env::var("TEMPSYNC_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TEMPSYNC_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("TEMPSYNC_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.network.host.trim().is_empty() {
            return Err(Error::config_field_invalid("network.host", "host cannot be empty"));
        }
        if self.network.port == 0 {
            return Err(Error::config_field_invalid(
                "network.port",
                "port must be between 1 and 65535",
            ));
        }
        if self.network.connect_timeout_ms == 0 {
            return Err(Error::config_field_invalid(
                "network.connect_timeout_ms",
                "connect_timeout_ms must be greater than 0",
            ));
        }
        if self.network.initial_retry_delay_ms > self.network.max_retry_delay_ms {
            return Err(Error::config_field_invalid(
                "network.initial_retry_delay_ms",
                "initial_retry_delay_ms cannot exceed max_retry_delay_ms",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        let valid_rotations = ["hourly", "daily", "never"];
        if !valid_rotations.contains(&self.logging.rotation.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.rotation",
                format!(
                    "Invalid rotation '{}'. Must be one of: {}",
                    self.logging.rotation,
                    valid_rotations.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location written by `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tempsync")
        .join("config.toml")
}

/// Initialize a new configuration file, returning where it was written
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|source| Error::IoWrite {
        path: config_path.clone(),
        source,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# tempsync configuration

[network]
# Host the central binds to and externals connect to
host = "127.0.0.1"

# TCP port of the central
port = 2000

# How long an external retries connecting before giving up (milliseconds)
connect_timeout_ms = 10000

# Retry delay bounds while the central is not yet listening (milliseconds)
initial_retry_delay_ms = 100
max_retry_delay_ms = 2000

[protocol]
# Stop after this many rounds without convergence (0 = run until stable)
max_rounds = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.tempsync/logs/tempsync.log"

# Log file rotation: hourly, daily, never
rotation = "daily"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TempSyncConfig::default();
        assert_eq!(config.network.address(), "127.0.0.1:2000");
        assert_eq!(config.protocol.max_rounds, 0);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("TEMPSYNC_PORT", "2500");
        env::set_var("TEMPSYNC_MAX_ROUNDS", "40");
        env::set_var("TEMPSYNC_LOG_JSON", "1");

        let mut config = TempSyncConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.network.port, 2500);
        assert_eq!(config.protocol.max_rounds, 40);
        assert!(config.logging.json_format);

        env::remove_var("TEMPSYNC_PORT");
        env::remove_var("TEMPSYNC_MAX_ROUNDS");
        env::remove_var("TEMPSYNC_LOG_JSON");
    }

    #[test]
    fn test_validation_rejects_port_zero() {
        let mut config = TempSyncConfig::default();
        config.network.port = 0;
        match config.validate() {
            Err(Error::ConfigValidation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("network.port"));
            }
            other => panic!("Expected ConfigValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_empty_host() {
        let mut config = TempSyncConfig::default();
        config.network.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_retry_delays() {
        let mut config = TempSyncConfig::default();
        config.network.initial_retry_delay_ms = 5000;
        config.network.max_retry_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = TempSyncConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[network]
host = "10.0.0.5"
port = 4000

[protocol]
max_rounds = 250

[logging]
level = "debug"
"#;

        let config: TempSyncConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.network.address(), "10.0.0.5:4000");
        assert_eq!(config.network.connect_timeout_ms, 10_000);
        assert_eq!(config.protocol.max_rounds, 250);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_generated_config_is_valid() {
        let config: TempSyncConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.port, DEFAULT_PORT);
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tempsync.toml");
        let path_str = path.to_str().unwrap();

        assert_eq!(init_config(Some(path_str), false).unwrap(), path);
        assert!(path.exists());
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        match TempSyncConfig::load(Some("/nonexistent/tempsync.toml")) {
            Err(Error::ConfigNotFound { path }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/tempsync.toml"));
            }
            other => panic!("Expected ConfigNotFound, got {:?}", other),
        }
    }
}
