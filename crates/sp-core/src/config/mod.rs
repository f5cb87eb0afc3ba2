//! Configuration for the spipe binaries
//!
//! Both binaries build one immutable config value at startup. The daemon
//! may start from a TOML file; command-line flags are layered on top.

mod daemon;
mod pipe;

pub use daemon::DaemonConfig;
pub use pipe::PipeConfig;

use crate::error::ConfigError;
use std::path::Path;

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Fail with `MissingField` when a required string value is empty
pub(crate) fn require(value: &str, field: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let result: Result<DaemonConfig, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_connections = \"many\"").unwrap();

        let result: Result<DaemonConfig, _> = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_require() {
        assert!(require("127.0.0.1:8025", "target").is_ok());
        assert!(matches!(
            require("  ", "target"),
            Err(ConfigError::MissingField("target"))
        ));
    }
}
