/*!
Common error types for the ACCURATE2 tools.
*/

use thiserror::Error;

/// Common result type used throughout the shared library
pub type Result<T> = std::result::Result<T, SharedError>;

/// Comprehensive error type for all shared operations
#[derive(Error, Debug)]
pub enum SharedError {
    /// I/O errors from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame arrived
    #[error("Stream closed after {received} of {expected} bytes")]
    StreamClosed { received: usize, expected: usize },

    /// Frame layout violates its invariants
    #[error("Invalid frame layout: {0}")]
    InvalidLayout(String),

    /// DAC channel letter outside A..H
    #[error("Invalid DAC channel '{0}': expected one of A-H")]
    InvalidChannel(String),

    /// Voltage that cannot be expressed as a 12-bit DAC code
    #[error("Invalid DAC voltage {voltage} V: must be within [0, {reference}) V")]
    InvalidVoltage { voltage: f64, reference: f64 },

    /// A decoded frame lacks a field the caller requires
    #[error("Missing field '{0}' in decoded frame")]
    MissingField(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SharedError {
    /// Create a new invalid layout error
    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        Self::InvalidLayout(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
