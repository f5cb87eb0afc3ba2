//! Core error types for spipe

use std::path::PathBuf;
use std::time::Duration;

use sp_transport::TransportError;
use thiserror::Error;

/// Top-level error type for the spipe crates
#[derive(Error, Debug)]
pub enum SpError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Relay error
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal condition of one relay direction
#[derive(Error, Debug)]
pub enum RelayError {
    /// Source reached end of stream
    #[error("End of stream")]
    Eof,

    /// A single read or write exceeded the per-operation deadline
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),

    /// Destination accepted fewer bytes than were read
    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    /// Secure transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Relay task ended abnormally
    #[error("Relay task failed: {0}")]
    TaskFailed(String),
}

impl RelayError {
    /// Whether this is a clean end of stream rather than a failure
    pub fn is_graceful(&self) -> bool {
        matches!(self, RelayError::Eof)
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
