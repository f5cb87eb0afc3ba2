//! Record header encoding/decoding
//!
//! Every record on the wire starts with a 4-byte header:
//! - kind: 1 byte (u8)
//! - payload_length: 3 bytes (u24, big-endian)

use bytes::{Buf, BufMut, BytesMut};

use crate::error::TransportError;

/// Size of the record header in bytes
pub const HEADER_SIZE: usize = 4;

/// Largest plaintext carried by a single sealed record
pub const MAX_PLAINTEXT_SIZE: usize = 16 * 1024;

/// Authentication tag appended by the AEAD
pub const TAG_SIZE: usize = 16;

/// Maximum payload size accepted on the wire
pub const MAX_PAYLOAD_SIZE: usize = MAX_PLAINTEXT_SIZE + TAG_SIZE;

/// Kind of record carried in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Plaintext handshake hello (nonce and ephemeral public key)
    Hello = 0x01,
    /// Encrypted, authenticated payload
    Sealed = 0x02,
}

impl RecordKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(RecordKind::Hello),
            0x02 => Some(RecordKind::Sealed),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Record header containing kind and length information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Type of record in the payload
    pub kind: RecordKind,
    /// Length of the payload in bytes
    pub payload_length: u32,
}

impl RecordHeader {
    /// Create a new record header
    pub fn new(kind: RecordKind, payload_length: u32) -> Self {
        Self {
            kind,
            payload_length,
        }
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u8(self.kind.as_u8());
        // payload_length: 3 bytes big-endian (24-bit)
        dst.put_u8((self.payload_length >> 16) as u8);
        dst.put_u16(self.payload_length as u16);
    }

    /// Decode a header from a byte buffer
    ///
    /// Returns None if there aren't enough bytes in the buffer.
    /// Returns Err if the record kind is unknown.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, TransportError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let kind_byte = src[0];
        let kind =
            RecordKind::from_u8(kind_byte).ok_or(TransportError::UnknownRecordKind(kind_byte))?;

        src.advance(1);
        let len_high = src.get_u8() as u32;
        let len_low = src.get_u16() as u32;

        Ok(Some(Self {
            kind,
            payload_length: (len_high << 16) | len_low,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = RecordHeader::new(RecordKind::Sealed, 12345);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = RecordHeader::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, header);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_24_bit_length() {
        let header = RecordHeader::new(RecordKind::Hello, 0x00AB_CDEF);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[0x01, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_insufficient_bytes() {
        let mut buf = BytesMut::from(&[0x02u8, 0x00][..]);
        assert!(RecordHeader::decode(&mut buf).unwrap().is_none());
        // Nothing consumed while waiting for more input
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_unknown_record_kind() {
        let mut buf = BytesMut::from(&[0xFE, 0, 0, 10][..]);
        assert!(matches!(
            RecordHeader::decode(&mut buf),
            Err(TransportError::UnknownRecordKind(0xFE))
        ));
    }
}
