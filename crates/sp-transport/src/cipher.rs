//! Per-direction record sealing

use bytes::Bytes;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::TransportError;

/// AEAD state for one direction of a secure stream
///
/// Nonces are a 64-bit record counter, so records must be opened in the
/// order they were sealed; a dropped, replayed or reordered record fails
/// authentication.
pub struct RecordCipher {
    aead: ChaCha20Poly1305,
    counter: u64,
}

impl RecordCipher {
    /// Create a cipher from a 32-byte direction key
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            aead: ChaCha20Poly1305::new(Key::from_slice(key)),
            counter: 0,
        }
    }

    fn next_nonce(&mut self) -> Result<[u8; 12], TransportError> {
        let mut nonce = [0u8; 12];
        nonce[4..].copy_from_slice(&self.counter.to_be_bytes());
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(TransportError::NonceExhausted)?;
        Ok(nonce)
    }

    /// Encrypt and authenticate the next record
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Bytes, TransportError> {
        let nonce = self.next_nonce()?;
        self.aead
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map(Bytes::from)
            .map_err(|_| TransportError::Encrypt)
    }

    /// Authenticate and decrypt the next record
    pub fn open(&mut self, ciphertext: &[u8]) -> Result<Bytes, TransportError> {
        let nonce = self.next_nonce()?;
        self.aead
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map(Bytes::from)
            .map_err(|_| TransportError::Decrypt)
    }
}
