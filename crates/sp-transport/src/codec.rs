//! Tokio codec for transport records

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;
use crate::frame::{RecordHeader, RecordKind, MAX_PAYLOAD_SIZE};

/// A complete record as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Plaintext handshake hello
    Hello(Bytes),
    /// Ciphertext produced by a [`crate::cipher::RecordCipher`]
    Sealed(Bytes),
}

impl Record {
    fn kind(&self) -> RecordKind {
        match self {
            Record::Hello(_) => RecordKind::Hello,
            Record::Sealed(_) => RecordKind::Sealed,
        }
    }

    fn payload(&self) -> &Bytes {
        match self {
            Record::Hello(payload) | Record::Sealed(payload) => payload,
        }
    }

    /// Short name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Record::Hello(_) => "hello",
            Record::Sealed(_) => "sealed",
        }
    }
}

/// Codec for encoding/decoding transport records
#[derive(Debug, Default)]
pub struct RecordCodec {
    /// Header already consumed while waiting for its payload
    pending_header: Option<RecordHeader>,
}

impl RecordCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match RecordHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(TransportError::RecordTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            self.pending_header = Some(header);
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();
        Ok(Some(match header.kind {
            RecordKind::Hello => Record::Hello(payload),
            RecordKind::Sealed => Record::Sealed(payload),
        }))
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = TransportError;

    fn encode(&mut self, record: Record, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_len = record.payload().len();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(TransportError::RecordTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        RecordHeader::new(record.kind(), payload_len as u32).encode(dst);
        dst.extend_from_slice(record.payload());

        Ok(())
    }
}
