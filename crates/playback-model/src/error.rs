use thiserror::Error;

/// Raised when a value cannot be stored under a bag key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("non-finite number {value} for key '{key}'")]
    NonFinite { key: String, value: f64 },

    #[error("key '{key}' holds scalars, got a structured value")]
    StructuredUnderScalar { key: String },

    #[error("key '{key}' expects {expected}, got {found}")]
    Shape {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("empty attribute key")]
    EmptyKey,
}
