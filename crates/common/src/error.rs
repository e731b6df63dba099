//! Error types for Playrun

use thiserror::Error;

/// Result type alias using Playrun Error
pub type Result<T> = std::result::Result<T, Error>;

/// Playrun error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Property file not found: {0}")]
    PropertyFileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid parallelism '{0}': expected off, auto or a positive integer")]
    InvalidParallelism(String),
}
