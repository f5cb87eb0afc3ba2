//! Stream and transport trait implementations for secure streams

use std::net::SocketAddr;

use async_trait::async_trait;
use sp_transport::{
    SecureListener, SecureReader, SecureStream, SecureWriter, SharedKey, TransportError,
    TransportOptions,
};

use crate::error::RelayError;
use crate::traits::{Acceptor, Connector, Stream, StreamReader, StreamWriter};

#[async_trait]
impl StreamReader for SecureReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        if buf.is_empty() {
            return Ok(0);
        }
        match SecureReader::read(self, buf).await? {
            0 => Err(RelayError::Eof),
            n => Ok(n),
        }
    }
}

#[async_trait]
impl StreamWriter for SecureWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, RelayError> {
        Ok(SecureWriter::write(self, buf).await?)
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        Ok(SecureWriter::close(self).await?)
    }

    async fn abort(&mut self) -> Result<(), RelayError> {
        Ok(SecureWriter::abort(self).await?)
    }
}

impl Stream for SecureStream {
    type Reader = SecureReader;
    type Writer = SecureWriter;

    fn peer(&self) -> String {
        self.peer_addr().to_string()
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        SecureStream::into_split(self)
    }
}

/// Dials secure streams to one fixed target address
#[derive(Debug, Clone)]
pub struct SecureConnector {
    key: SharedKey,
    target: String,
    options: TransportOptions,
}

impl SecureConnector {
    pub fn new(key: SharedKey, target: impl Into<String>, options: TransportOptions) -> Self {
        Self {
            key,
            target: target.into(),
            options,
        }
    }
}

#[async_trait]
impl Connector for SecureConnector {
    type Stream = SecureStream;

    async fn connect(&self) -> Result<SecureStream, TransportError> {
        sp_transport::dial(&self.key, self.target.as_str(), &self.options).await
    }

    fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Acceptor for SecureListener {
    type Stream = SecureStream;

    async fn accept(&mut self) -> Result<SecureStream, TransportError> {
        SecureListener::accept(self).await
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        SecureListener::local_addr(self)
    }
}
