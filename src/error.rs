//! Error module for the Rusty Microcircuit library.
use thiserror::Error;

/// Error types for the library.
#[derive(Debug, PartialEq, Error)]
pub enum SNNError {
    /// Error for invalid parameters, e.g., a negative resolution or a mismatched population vector.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    /// Error for out of bounds access, e.g., neuron or population not found.
    #[error("Index out of bounds: {0}")]
    OutOfBounds(String),
    /// Error for invalid operation, e.g., simulating a network before connecting it.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Error for a recording file that exists already and must not be overwritten.
    #[error("The device file '{0}' exists already and will not be overwritten. Please change data_path or data_prefix, or set overwrite_files to true.")]
    FileExists(String),
    /// Error for I/O operations.
    #[error("I/O error: {0}")]
    IOError(String),
    /// Error while reading or writing a parameter file.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for SNNError {
    fn from(e: std::io::Error) -> Self {
        SNNError::IOError(e.to_string())
    }
}
