//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extraction error
    #[error(transparent)]
    Extraction(#[from] vellum_extractor::ExtractorError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] vellum_store::StoreError),

    /// Oracle setup error
    #[error("Oracle error: {0}")]
    Oracle(#[from] vellum_oracle::OracleError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Result computed but the store rejected it
    #[error("Result was computed but not stored: {0}")]
    NotStored(String),

    /// Nothing stored for the document
    #[error("Nothing found for document '{0}'")]
    NotFound(String),
}
