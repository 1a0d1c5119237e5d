//! Error types for the self-healing engine.

use thiserror::Error;

use crate::category::FailureCategory;

/// Top-level error type for healing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration document could not be parsed.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// No healing strategy is registered for the category.
    #[error("no healing strategy registered for {0}")]
    UnsupportedCategory(FailureCategory),

    /// Engine configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be decoded.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON export failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::MalformedDocument(err.to_string())
    }
}

/// Result type alias for healing operations.
pub type Result<T> = std::result::Result<T, Error>;
