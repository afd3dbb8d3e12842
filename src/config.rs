//! Configuration for the scoring service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub cache: CacheConfig,
    pub nats: NatsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Persisted model artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory containing the persisted artifacts.
    pub models_dir: String,
    /// Classifier artifact file name.
    pub model_file: String,
    /// Amount scaler artifact file name.
    pub scaler_file: String,
    /// Number of threads for ONNX inference.
    pub onnx_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            model_file: "fraud_model.onnx".to_string(),
            scaler_file: "scaler.json".to_string(),
            onnx_threads: 1,
        }
    }
}

impl ModelsConfig {
    pub fn model_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.model_file)
    }

    pub fn scaler_path(&self) -> PathBuf {
        Path::new(&self.models_dir).join(&self.scaler_file)
    }
}

/// Detection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Decision threshold used when the model artifact carries no
    /// label output of its own.
    pub threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Time-to-live for cached results, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// NATS connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Whether the event bus is wired up at all. The service runs
    /// standalone when disabled.
    pub enabled: bool,
    pub url: String,
    /// Subject for incoming transactions.
    pub transaction_subject: String,
    /// Subject for outgoing fraud alerts.
    pub alert_subject: String,
    /// Upper bound on a single publish call, in milliseconds.
    pub publish_timeout_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "nats://localhost:4222".to_string(),
            transaction_subject: "transactions".to_string(),
            alert_subject: "fraud.alerts".to_string(),
            publish_timeout_ms: 1000,
        }
    }
}

impl NatsConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location, with
    /// `FRAUDGUARD__SECTION__KEY` environment overrides on top.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path. A missing file is fine;
    /// defaults and environment overrides still apply.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("FRAUDGUARD").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
