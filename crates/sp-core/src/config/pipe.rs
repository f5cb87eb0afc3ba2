//! Client pipe configuration

use std::path::PathBuf;
use std::time::Duration;

use sp_transport::TransportOptions;

use super::require;
use crate::error::ConfigError;
use crate::types::Deadline;

/// Configuration for the `spipe` client
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Secure endpoint to dial
    pub target_address: String,

    /// Shared key file
    pub key_file: PathBuf,

    /// Per-operation inactivity timeout (0 disables)
    pub timeout: Duration,

    /// Upper bound on connect plus handshake
    pub handshake_timeout: Duration,
}

impl PipeConfig {
    pub fn new(target_address: impl Into<String>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            target_address: target_address.into(),
            key_file: key_file.into(),
            timeout: Duration::ZERO,
            handshake_timeout: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.target_address, "target")?;
        if self.key_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("key-file"));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Deadline {
        Deadline::new(self.timeout)
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            handshake_timeout: self.handshake_timeout,
            ..TransportOptions::default()
        }
    }
}
