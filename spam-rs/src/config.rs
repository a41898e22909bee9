//! Configuration for spam-rs

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ensemble::{
    EnsembleConfig, MemberWeight, ModelId, DEFAULT_CLASSIFIER_TIMEOUT_MS, DEFAULT_THRESHOLD,
};
use crate::error::{EngineError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ensemble: EnsembleSettings,
    /// Member classifiers, in voting order
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Decision engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnsembleSettings {
    /// Spam-score cutoff, inclusive
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Per-classifier timeout
    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,
}

/// One member classifier
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(flatten)]
    pub backend: BackendConfig,
}

/// Where a member classifier's predictions come from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Linear model artifact (JSON)
    Linear { path: PathBuf },
    /// Naive Bayes token statistics (JSON)
    Bayes { path: PathBuf },
    /// Decision tree forest (JSON)
    Forest { path: PathBuf },
    /// Keyword/regex rules, built-in set when no path is given
    Rules {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// External model server
    Remote { url: String },
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Linear { .. } => "linear",
            BackendConfig::Bayes { .. } => "bayes",
            BackendConfig::Forest { .. } => "forest",
            BackendConfig::Rules { .. } => "rules",
            BackendConfig::Remote { .. } => "remote",
        }
    }

    fn path_mut(&mut self) -> Option<&mut PathBuf> {
        match self {
            BackendConfig::Linear { path }
            | BackendConfig::Bayes { path }
            | BackendConfig::Forest { path } => Some(path),
            BackendConfig::Rules { path } => path.as_mut(),
            BackendConfig::Remote { .. } => None,
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_classifier_timeout_ms() -> u64 {
    DEFAULT_CLASSIFIER_TIMEOUT_MS
}

fn default_weight() -> f64 {
    1.0
}

fn default_models() -> Vec<ModelConfig> {
    let model = |id: &str, backend: BackendConfig| ModelConfig {
        id: id.to_string(),
        weight: default_weight(),
        backend,
    };

    vec![
        model(
            "svm",
            BackendConfig::Linear {
                path: PathBuf::from("models/svm.json"),
            },
        ),
        model(
            "naive_bayes",
            BackendConfig::Bayes {
                path: PathBuf::from("models/naive_bayes.json"),
            },
        ),
        model(
            "random_forest",
            BackendConfig::Forest {
                path: PathBuf::from("models/random_forest.json"),
            },
        ),
        model(
            "logistic_regression",
            BackendConfig::Linear {
                path: PathBuf::from("models/logistic_regression.json"),
            },
        ),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for EnsembleSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            classifier_timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Relative model paths are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::ConfigInvalid(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EngineError::ConfigInvalid(format!("Failed to parse config: {}", e)))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for model in &mut self.models {
            if let Some(path) = model.backend.path_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.ensemble.classifier_timeout_ms)
    }

    /// Validated decision engine configuration
    pub fn ensemble_config(&self) -> Result<EnsembleConfig> {
        let members = self
            .models
            .iter()
            .map(|m| MemberWeight {
                id: ModelId::new(m.id.clone()),
                weight: m.weight,
            })
            .collect();

        EnsembleConfig::new(members, self.ensemble.threshold, self.classifier_timeout())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.server.listen_addr.parse::<SocketAddr>().map_err(|e| {
            EngineError::ConfigInvalid(format!(
                "Invalid listen address '{}': {}",
                self.server.listen_addr, e
            ))
        })?;

        if self.server.max_body_bytes == 0 {
            return Err(EngineError::ConfigInvalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }

        self.ensemble_config()?;
        Ok(())
    }
}
