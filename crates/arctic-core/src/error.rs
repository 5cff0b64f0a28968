use thiserror::Error;

/// Top-level error type for the Arctic Vision system.
///
/// Subsystem crates define their own error types and implement
/// `From<ArcticError>` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArcticError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secret store error: {0}")]
    Secrets(String),

    #[error("Missing secret: {0}")]
    MissingSecret(String),

    #[error("Invalid control value: {0}")]
    InvalidControl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ArcticError {
    fn from(err: toml::de::Error) -> Self {
        ArcticError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ArcticError {
    fn from(err: toml::ser::Error) -> Self {
        ArcticError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ArcticError {
    fn from(err: serde_json::Error) -> Self {
        ArcticError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Arctic Vision operations.
pub type Result<T> = std::result::Result<T, ArcticError>;
