use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::channel::optimizer_endpoint;

/// Application configuration: `config.toml` (optional), then `OPTIMIZER_*`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the dashboard is served from. Its scheme picks ws vs wss.
    pub origin: String,
    pub optimizer_path: String,
    pub api_base_url: String,
    pub store_path: String,
    /// Seconds without a frame before an in-flight sweep is abandoned.
    /// Zero disables the timeout.
    pub sweep_timeout_secs: u64,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            optimizer_path: "/ws/optimize".to_string(),
            api_base_url: "http://localhost:8000/api".to_string(),
            store_path: "./optimizer_session.db".to_string(),
            sweep_timeout_secs: 600,
            token: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let defaults = AppConfig::default();
        let config: AppConfig = Config::builder()
            .set_default("origin", defaults.origin)?
            .set_default("optimizer_path", defaults.optimizer_path)?
            .set_default("api_base_url", defaults.api_base_url)?
            .set_default("store_path", defaults.store_path)?
            .set_default("sweep_timeout_secs", defaults.sweep_timeout_secs)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("OPTIMIZER").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join(", ")))?;
        debug!("Loaded configuration: {:?}", config.redacted());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = optimizer_endpoint(&self.origin, &self.optimizer_path) {
            errors.push(format!("origin: {}", e));
        }
        if !self.optimizer_path.starts_with('/') {
            errors.push("optimizer_path must start with '/'".to_string());
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            errors.push("api_base_url must be an http(s) URL".to_string());
        }
        if self.store_path.trim().is_empty() {
            errors.push("store_path must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn sweep_timeout(&self) -> Option<Duration> {
        (self.sweep_timeout_secs > 0).then(|| Duration::from_secs(self.sweep_timeout_secs))
    }

    fn redacted(&self) -> Self {
        Self {
            token: self.token.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }
}
