use crate::layout::LayoutError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("a tokio runtime is required: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("session ended before reaching a terminal state")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, TuiError>;
