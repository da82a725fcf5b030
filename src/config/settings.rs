//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

/// Studio server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Upstream Stable Diffusion API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_timeout() -> u64 {
    180_000
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Generation session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reset_delay")]
    pub reset_delay_ms: u64,
    #[serde(default = "default_sampler")]
    pub default_sampler: String,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_reset_delay() -> u64 {
    3000
}

fn default_sampler() -> String {
    "Euler".to_string()
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

/// Where the image history is kept
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    File,
    Memory,
}

impl Default for HistoryBackend {
    fn default() -> Self {
        HistoryBackend::File
    }
}

/// Image history configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    #[serde(default = "default_history_dir")]
    pub dir: String,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Rough per-image footprint used by history statistics
    #[serde(default = "default_record_size")]
    pub record_size_estimate_mb: f64,
}

fn default_history_dir() -> String {
    "./data".to_string()
}

fn default_storage_key() -> String {
    "stable-diffusion-image-history".to_string()
}

fn default_record_size() -> f64 {
    0.5
}

impl HistoryConfig {
    /// Full path of the history file
    pub fn file_path(&self) -> PathBuf {
        Path::new(&self.dir).join(format!("{}.json", self.storage_key))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    /// Load settings from the default configuration file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/studio.yaml")
    }

    /// Load settings from a specific configuration file (YAML or TOML)
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("api.base_url", default_base_url())?
            .set_default("api.timeout_ms", default_timeout() as i64)?
            .set_default("session.poll_interval_ms", default_poll_interval() as i64)?
            .set_default("session.reset_delay_ms", default_reset_delay() as i64)?
            .set_default("session.default_sampler", default_sampler())?
            .set_default("history.backend", "file")?
            .set_default("history.dir", default_history_dir())?
            .set_default("history.storage_key", default_storage_key())?
            .set_default("history.record_size_estimate_mb", default_record_size())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if path.exists() {
            config_builder = config_builder.add_source(File::from(path).format(format));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("SD_STUDIO")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = config_builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.api.base_url
            )));
        }

        if self.api.timeout_ms == 0 {
            return Err(invalid("API timeout cannot be 0"));
        }

        if self.session.poll_interval_ms == 0 {
            return Err(invalid("Progress poll interval cannot be 0"));
        }

        if self.history.storage_key.trim().is_empty() {
            return Err(invalid("History storage key cannot be empty"));
        }

        if !(self.history.record_size_estimate_mb >= 0.0) {
            return Err(invalid("History record size estimate must be non-negative"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            api: ApiConfig {
                base_url: default_base_url(),
                timeout_ms: default_timeout(),
            },
            session: SessionConfig::default(),
            history: HistoryConfig {
                backend: HistoryBackend::default(),
                dir: default_history_dir(),
                storage_key: default_storage_key(),
                record_size_estimate_mb: default_record_size(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            reset_delay_ms: default_reset_delay(),
            default_sampler: default_sampler(),
        }
    }
}
