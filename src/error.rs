//! Top-level error types for koboldbot.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: Box<toml::de::Error>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Conversation history errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("history is empty")]
    Empty,
}

/// Inference server errors raised during a generation cycle.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Transport failure, timeout, or a non-2xx status.
    #[error("inference server unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 2xx response without `results[0].text`.
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
}

/// Fatal boot-time errors. The process must not serve messages after one.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("bot is not in the guild: {guild}")]
    GuildMissing { guild: String },

    #[error("inference server at {endpoint} is not online")]
    UpstreamDown { endpoint: String },
}
