//! Error types for sinharc

use thiserror::Error;

/// sinharc error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parameter or argument validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Shapes that cannot be broadcast together
    #[error("Shape error: {0}")]
    Shape(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
