//! Connection handshake
//!
//! Both sides send a hello record carrying a random nonce and an ephemeral
//! X25519 public key. Each direction's record key is then derived as
//!
//! ```text
//! SHA-256(label || shared_key || dh(ephemeral, peer_ephemeral) || SHA-256(initiator_hello || responder_hello))
//! ```
//!
//! and both sides prove possession of the shared key by sending a sealed
//! confirmation record before any data flows.

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::cipher::RecordCipher;
use crate::codec::{Record, RecordCodec};
use crate::error::TransportError;
use crate::key::SharedKey;

/// Size of the random nonce in a hello record
pub const NONCE_SIZE: usize = 32;

/// Size of a hello record payload (nonce + public key)
pub const HELLO_SIZE: usize = NONCE_SIZE + 32;

const INITIATOR_TO_RESPONDER: &[u8] = b"spipe-rs initiator->responder";
const RESPONDER_TO_INITIATOR: &[u8] = b"spipe-rs responder->initiator";
const CONFIRM_LABEL: &[u8] = b"spipe-rs confirm";

/// Which end of the connection is running the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The dialing side
    Initiator,
    /// The accepting side
    Responder,
}

impl Role {
    fn peer(self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Role::Initiator => b'I',
            Role::Responder => b'R',
        }
    }
}

/// Record ciphers produced by a successful handshake
pub struct SessionCiphers {
    /// Seals records we send
    pub outbound: RecordCipher,
    /// Opens records we receive
    pub inbound: RecordCipher,
}

/// Run the handshake over an already-framed connection
pub async fn perform<R, W>(
    role: Role,
    key: &SharedKey,
    reader: &mut FramedRead<R, RecordCodec>,
    writer: &mut FramedWrite<W, RecordCodec>,
) -> Result<SessionCiphers, TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    let secret = EphemeralSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);

    let mut hello = BytesMut::with_capacity(HELLO_SIZE);
    hello.put_slice(&nonce);
    hello.put_slice(public.as_bytes());
    let hello = hello.freeze();

    writer.send(Record::Hello(hello.clone())).await?;

    let peer_hello = match next_record(reader).await? {
        Record::Hello(payload) => payload,
        other => return Err(TransportError::UnexpectedRecord(other.name())),
    };
    let peer_public = parse_hello(&peer_hello)?;

    let shared = secret.diffie_hellman(&peer_public);
    if !shared.was_contributory() {
        return Err(TransportError::MalformedHandshake(
            "peer sent a low-order public key".into(),
        ));
    }

    let (initiator_hello, responder_hello) = match role {
        Role::Initiator => (&hello, &peer_hello),
        Role::Responder => (&peer_hello, &hello),
    };
    let transcript: [u8; 32] = Sha256::new()
        .chain_update(initiator_hello)
        .chain_update(responder_hello)
        .finalize()
        .into();

    let i2r = derive_key(INITIATOR_TO_RESPONDER, key, shared.as_bytes(), &transcript);
    let r2i = derive_key(RESPONDER_TO_INITIATOR, key, shared.as_bytes(), &transcript);
    let (mut outbound, mut inbound) = match role {
        Role::Initiator => (RecordCipher::new(&i2r), RecordCipher::new(&r2i)),
        Role::Responder => (RecordCipher::new(&r2i), RecordCipher::new(&i2r)),
    };

    // Both sides send before reading, so neither waits on the other.
    let confirm = outbound.seal(&confirm_tag(role, &transcript))?;
    writer.send(Record::Sealed(confirm)).await?;

    let peer_confirm = match next_record(reader).await? {
        Record::Sealed(ciphertext) => inbound
            .open(&ciphertext)
            .map_err(|_| TransportError::AuthenticationFailed)?,
        other => return Err(TransportError::UnexpectedRecord(other.name())),
    };
    if peer_confirm[..] != confirm_tag(role.peer(), &transcript) {
        return Err(TransportError::AuthenticationFailed);
    }

    Ok(SessionCiphers { outbound, inbound })
}

async fn next_record<R>(reader: &mut FramedRead<R, RecordCodec>) -> Result<Record, TransportError>
where
    R: AsyncRead + Unpin,
{
    match reader.next().await {
        Some(result) => result,
        None => Err(TransportError::ClosedDuringHandshake),
    }
}

fn parse_hello(payload: &Bytes) -> Result<PublicKey, TransportError> {
    if payload.len() != HELLO_SIZE {
        return Err(TransportError::MalformedHandshake(format!(
            "hello is {} bytes, expected {}",
            payload.len(),
            HELLO_SIZE
        )));
    }
    let mut public = [0u8; 32];
    public.copy_from_slice(&payload[NONCE_SIZE..]);
    Ok(PublicKey::from(public))
}

fn derive_key(label: &[u8], key: &SharedKey, dh: &[u8; 32], transcript: &[u8; 32]) -> [u8; 32] {
    Sha256::new()
        .chain_update(label)
        .chain_update(key.as_bytes())
        .chain_update(dh)
        .chain_update(transcript)
        .finalize()
        .into()
}

fn confirm_tag(role: Role, transcript: &[u8; 32]) -> [u8; 32] {
    Sha256::new()
        .chain_update(CONFIRM_LABEL)
        .chain_update([role.tag()])
        .chain_update(transcript)
        .finalize()
        .into()
}
