//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use sp_transport::TransportOptions;

use super::require;
use crate::error::ConfigError;
use crate::types::Deadline;

/// Configuration for the `spiped` daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Address to accept secure connections on
    pub source_address: String,

    /// Secure endpoint each accepted connection is forwarded to
    pub target_address: String,

    /// Shared key file
    pub key_file: PathBuf,

    /// Maximum number of concurrently forwarded sessions
    pub max_connections: usize,

    /// Per-operation inactivity timeout for forwarded sessions (0 disables)
    #[serde(with = "whole_secs")]
    pub timeout: Duration,

    /// Upper bound on an inbound handshake
    #[serde(with = "whole_secs")]
    pub handshake_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            source_address: String::new(),
            target_address: String::new(),
            key_file: PathBuf::new(),
            max_connections: 100,
            timeout: Duration::ZERO,
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

impl DaemonConfig {
    /// Check that required fields are present and values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.source_address, "source")?;
        require(&self.target_address, "target")?;
        if self.key_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("key-file"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max connections must be at least 1".to_string(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "handshake timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-operation deadline for forwarded sessions
    pub fn deadline(&self) -> Deadline {
        Deadline::new(self.timeout)
    }

    /// Options for the secure listener
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            handshake_timeout: self.handshake_timeout,
            // Never let pending handshakes dwarf the session limit
            max_pending_handshakes: self.max_connections.clamp(1, 128),
        }
    }
}

/// Durations written as a plain number of seconds
mod whole_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> DaemonConfig {
        DaemonConfig {
            source_address: "0.0.0.0:8025".to_string(),
            target_address: "127.0.0.1:25".to_string(),
            key_file: PathBuf::from("/etc/spiped/smtp.key"),
            ..DaemonConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.deadline(), Deadline::NONE);
        assert_eq!(config.handshake_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_complete() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_fields() {
        let config = DaemonConfig {
            source_address: String::new(),
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("source"))
        ));

        let config = DaemonConfig {
            key_file: PathBuf::new(),
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("key-file"))
        ));
    }

    #[test]
    fn test_validate_zero_connections() {
        let config = DaemonConfig {
            max_connections: 0,
            ..complete()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: DaemonConfig = toml::from_str(
            r#"
            source_address = "[::]:8025"
            target_address = "127.0.0.1:25"
            timeout = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.source_address, "[::]:8025");
        assert_eq!(config.deadline().limit(), Some(Duration::from_secs(300)));
        // Unset fields keep their defaults
        assert_eq!(config.max_connections, 100);
        assert!(config.key_file.as_os_str().is_empty());
    }

    #[test]
    fn test_timeouts_in_whole_seconds() {
        let config: DaemonConfig = toml::from_str("timeout = 0\nhandshake_timeout = 10").unwrap();
        assert_eq!(config.deadline(), Deadline::NONE);
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));

        assert!(toml::from_str::<DaemonConfig>("timeout = -5").is_err());
        assert!(toml::from_str::<DaemonConfig>("timeout = \"5s\"").is_err());

        let written = toml::to_string(&complete()).unwrap();
        assert!(written.contains("handshake_timeout = 30"));
    }

    #[test]
    fn test_pending_handshakes_follow_capacity() {
        let config = DaemonConfig {
            max_connections: 4,
            ..complete()
        };
        assert_eq!(config.transport_options().max_pending_handshakes, 4);
        assert_eq!(complete().transport_options().max_pending_handshakes, 100);
    }
}
