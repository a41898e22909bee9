//! Error types for spam-rs

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or duplicate member results, or empty request content
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A single classifier failed or timed out
    #[error("Classifier {model} unavailable: {reason}")]
    MemberUnavailable { model: String, reason: String },

    /// Every configured classifier failed, no verdict can be produced
    #[error("All {configured} classifiers unavailable")]
    AllMembersUnavailable { configured: usize },

    /// Weights, threshold or model list malformed
    #[error("Configuration error: {0}")]
    ConfigInvalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EngineError {
    /// Stable error code exposed to API clients
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::MemberUnavailable { .. } => "member_unavailable",
            EngineError::AllMembersUnavailable { .. } => "all_members_unavailable",
            EngineError::ConfigInvalid(_) => "config_invalid",
            EngineError::Io(_) | EngineError::Json(_) | EngineError::Http(_) => "internal",
        }
    }
}
