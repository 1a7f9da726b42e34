//! Bootstrap configuration for tilawa-player
//!
//! Two tiers:
//! 1. **TOML bootstrap**: port, database path, content/audio/session tuning
//! 2. **Database runtime**: playback defaults in the `settings` table
//!
//! Priority: command-line flags > environment > TOML file > built-in defaults.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database file (defaults to `<data dir>/tilawa.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: None,
            content: ContentConfig::default(),
            audio: AudioConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Content provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Reciter edition used when a request names none
    #[serde(default = "default_reciter")]
    pub default_reciter: String,

    /// Total attempts per request (transport errors and 5xx only)
    #[serde(default = "default_request_retries")]
    pub request_retries: u32,

    /// Linear backoff unit: attempt n waits n × backoff
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_reciter: default_reciter(),
            request_retries: default_request_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ContentConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Audio backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Peak buckets per verse; enables waveform events when set
    #[serde(default)]
    pub waveform_buckets: Option<usize>,

    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            progress_interval_ms: default_progress_interval_ms(),
            waveform_buckets: None,
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

impl AudioConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(10))
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

/// Session sequencing settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Wait after a verse-level failure before moving on
    #[serde(default = "default_error_advance_delay_ms")]
    pub error_advance_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            error_advance_delay_ms: default_error_advance_delay_ms(),
        }
    }
}

impl SessionConfig {
    pub fn error_advance_delay(&self) -> Duration {
        Duration::from_millis(self.error_advance_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    5750
}

fn default_base_url() -> String {
    "https://api.alquran.cloud/v1".to_string()
}

fn default_reciter() -> String {
    "ar.alafasy".to_string()
}

fn default_request_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_progress_interval_ms() -> u64 {
    250
}

fn default_load_timeout_secs() -> u64 {
    30
}

fn default_error_advance_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub content: ContentConfig,
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    /// File the TOML tier came from, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Resolve configuration from CLI overrides, the TOML file and defaults
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let (toml_config, source): (TomlConfig, Option<PathBuf>) =
            tilawa_common::config::load_or_default(overrides.config_path.as_deref())?;

        if let Some(path) = &source {
            info!("Loaded TOML configuration from {}", path.display());
        }

        Self::from_toml(toml_config, source, overrides)
    }

    pub fn from_toml(
        toml_config: TomlConfig,
        source: Option<PathBuf>,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        let database_path = overrides
            .database_path
            .or(toml_config.database_path)
            .unwrap_or_else(|| tilawa_common::config::resolve_data_dir(None).join("tilawa.db"));

        if toml_config.content.request_retries == 0 {
            return Err(Error::Config(
                "content.request_retries must be at least 1".to_string(),
            ));
        }
        if toml_config.content.default_reciter.trim().is_empty() {
            return Err(Error::Config(
                "content.default_reciter must not be empty".to_string(),
            ));
        }
        if toml_config.audio.waveform_buckets == Some(0) {
            return Err(Error::Config(
                "audio.waveform_buckets must be positive when set".to_string(),
            ));
        }

        Ok(Self {
            port: overrides.port.unwrap_or(toml_config.port),
            database_path,
            content: toml_config.content,
            audio: toml_config.audio,
            session: toml_config.session,
            logging: toml_config.logging,
            source,
        })
    }

    /// Folder containing the database file
    pub fn data_dir(&self) -> Option<&Path> {
        self.database_path.parent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let parsed: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.port, 5750);
        assert_eq!(parsed.content.default_reciter, "ar.alafasy");
        assert_eq!(parsed.content.request_retries, 3);
        assert_eq!(parsed.audio.progress_interval(), Duration::from_millis(250));
        assert_eq!(parsed.session.error_advance_delay(), Duration::from_millis(500));
        assert_eq!(parsed.logging.level, "info");
        assert!(parsed.audio.waveform_buckets.is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let parsed: TomlConfig = toml::from_str(
            r#"
            port = 6000
            database_path = "/tmp/tilawa-test.db"

            [content]
            default_reciter = "ar.husary"
            retry_backoff_ms = 10

            [audio]
            waveform_buckets = 64
            "#,
        )
        .unwrap();

        let config = Config::from_toml(parsed, None, ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/tilawa-test.db"));
        assert_eq!(config.content.default_reciter, "ar.husary");
        assert_eq!(config.content.retry_backoff(), Duration::from_millis(10));
        assert_eq!(config.audio.waveform_buckets, Some(64));
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = ConfigOverrides {
            config_path: None,
            database_path: Some(PathBuf::from("/tmp/cli.db")),
            port: Some(7000),
        };

        let config = Config::from_toml(TomlConfig::default(), None, overrides).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/cli.db"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut toml_config = TomlConfig::default();
        toml_config.content.request_retries = 0;
        assert!(Config::from_toml(toml_config, None, ConfigOverrides::default()).is_err());

        let mut toml_config = TomlConfig::default();
        toml_config.audio.waveform_buckets = Some(0);
        assert!(Config::from_toml(toml_config, None, ConfigOverrides::default()).is_err());
    }
}
