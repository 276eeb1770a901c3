use playback_model::FormatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Agent error: {0}")]
    Agent(#[from] qoe_agent::Error),

    #[error("Invalid attribute: {0}")]
    Format(#[from] FormatError),

    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
