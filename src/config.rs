//! Configuration loader and validator for the scan sync agent.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub classifier: Classifier,
    pub history: History,
    pub connectivity: Connectivity,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub max_retries: i32,
    pub probe_interval_secs: u64,
}

/// AI classification gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classifier {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// Scan history archive settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct History {
    pub endpoint: String,
    pub api_key: String,
}

/// Connectivity probe settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connectivity {
    pub probe_url: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// Database URL: `DATABASE_URL` env var, else a file in `data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/cropscan.db", self.app.data_dir))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.max_retries < 1 {
        return Err(ConfigError::Invalid("app.max_retries must be >= 1"));
    }
    if cfg.app.probe_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.probe_interval_secs must be > 0"));
    }

    if cfg.classifier.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("classifier.endpoint must be non-empty"));
    }
    if cfg.classifier.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("classifier.api_key must be non-empty"));
    }
    if cfg.classifier.model.trim().is_empty() {
        return Err(ConfigError::Invalid("classifier.model must be non-empty"));
    }

    if cfg.history.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("history.endpoint must be non-empty"));
    }
    if cfg.history.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("history.api_key must be non-empty"));
    }

    if cfg.connectivity.probe_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "connectivity.probe_url must be non-empty",
        ));
    }

    Ok(())
}

/// Complete sample configuration, used by docs and tests.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  max_retries: 3
  probe_interval_secs: 30

classifier:
  endpoint: "https://ai.gateway.example/v1/classify"
  api_key: "YOUR_CLASSIFIER_API_KEY"
  model: "crop-disease-v2"

history:
  endpoint: "https://backend.example/rest/v1/scan_history"
  api_key: "YOUR_BACKEND_API_KEY"

connectivity:
  probe_url: "https://backend.example/health"
"#
}
