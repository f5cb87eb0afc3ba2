//! Pre-shared key handling

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::TransportError;

/// Shared secret both ends of a secure stream must hold
///
/// The key file contents are used verbatim as input key material and
/// condensed to 32 bytes with SHA-256, so any file (random bytes, a
/// passphrase) works as long as both sides use the same one.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Derive a key from raw key material
    pub fn from_bytes(material: &[u8]) -> Result<Self, TransportError> {
        if material.is_empty() {
            return Err(TransportError::InvalidKey("key material is empty".into()));
        }
        Ok(Self(Sha256::digest(material).into()))
    }

    /// Load key material from a file
    pub fn load(path: &Path) -> Result<Self, TransportError> {
        let material = std::fs::read(path).map_err(|source| TransportError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&material)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}
