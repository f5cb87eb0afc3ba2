//! sp-transport: Encrypted stream transport for spipe
//!
//! This crate provides authenticated, encrypted point-to-point byte streams
//! established from a pre-shared key. The relay crates treat it as an
//! opaque dial/listen primitive.
//!
//! Every connection starts with a handshake exchanging ephemeral X25519
//! keys; per-direction session keys are derived from the shared key and
//! the handshake transcript, and all data afterwards travels in
//! ChaCha20-Poly1305 sealed records.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod key;
pub mod stream;

pub use codec::{Record, RecordCodec};
pub use error::TransportError;
pub use frame::{RecordHeader, RecordKind, HEADER_SIZE, MAX_PAYLOAD_SIZE, MAX_PLAINTEXT_SIZE};
pub use key::SharedKey;
pub use stream::{dial, SecureListener, SecureReader, SecureStream, SecureWriter, TransportOptions};
