//! Agent-wide error types.

use playback_model::FormatError;
use thiserror::Error;

/// Agent-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Agent-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transmission failed: {0}")]
    Transmission(String),

    #[error("Delivery queue overflow: {dropped} events dropped")]
    Overflow { dropped: u64 },

    #[error("Playhead discontinuity of {jump_ms}ms")]
    Discontinuity { jump_ms: i64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transmission(msg: impl Into<String>) -> Self {
        Self::Transmission(msg.into())
    }

    /// Fatal errors are surfaced to the host; everything else is logged and absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
