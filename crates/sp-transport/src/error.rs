//! Transport error types

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while establishing or using a secure stream
#[derive(Error, Debug)]
pub enum TransportError {
    /// Key file could not be read
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key material is unusable
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Unknown record kind on the wire
    #[error("Unknown record kind: {0:#04x}")]
    UnknownRecordKind(u8),

    /// Record payload exceeds maximum size
    #[error("Record too large: {size} bytes exceeds maximum of {max} bytes")]
    RecordTooLarge { size: usize, max: usize },

    /// A record arrived that is not valid in the current state
    #[error("Unexpected {0} record")]
    UnexpectedRecord(&'static str),

    /// Handshake message was malformed
    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    /// Peer closed the connection during the handshake
    #[error("Connection closed during handshake")]
    ClosedDuringHandshake,

    /// Handshake did not finish in time
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Peer does not hold the same shared key
    #[error("Authentication failed: peer key does not match")]
    AuthenticationFailed,

    /// Handshake with an inbound peer failed
    #[error("Handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: Box<TransportError>,
    },

    /// A sealed record failed authentication
    #[error("Record decryption failed")]
    Decrypt,

    /// Record encryption failed
    #[error("Record encryption failed")]
    Encrypt,

    /// Record counter would wrap
    #[error("Record nonce space exhausted")]
    NonceExhausted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Attach the inbound peer address to a handshake failure
    pub fn during_handshake_with(self, peer: SocketAddr) -> Self {
        TransportError::Handshake {
            peer,
            source: Box::new(self),
        }
    }
}
