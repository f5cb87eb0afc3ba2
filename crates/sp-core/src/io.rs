//! Stream adapters for tokio I/O types
//!
//! Tokio readers signal end of stream with `Ok(0)`; the adapters translate
//! that into [`RelayError::Eof`] so a relay can tell an empty read from a
//! closed source.

use std::net::SocketAddr;

use async_trait::async_trait;
use sp_transport::TransportError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::error::RelayError;
use crate::traits::{Acceptor, Connector, Stream, StreamReader, StreamWriter};

/// [`StreamReader`] over any tokio reader
pub struct IoReader<R> {
    inner: R,
}

impl<R> IoReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R> StreamReader for IoReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.inner.read(buf).await? {
            0 => Err(RelayError::Eof),
            n => Ok(n),
        }
    }
}

/// [`StreamWriter`] over any tokio writer
pub struct IoWriter<W> {
    inner: W,
}

impl<W> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> StreamWriter for IoWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, RelayError> {
        self.inner.write_all(buf).await?;
        self.inner.flush().await?;
        Ok(buf.len())
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

impl Stream for TcpStream {
    type Reader = IoReader<OwnedReadHalf>;
    type Writer = IoWriter<OwnedWriteHalf>;

    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        let (read_half, write_half) = TcpStream::into_split(self);
        (IoReader::new(read_half), IoWriter::new(write_half))
    }
}

impl Stream for DuplexStream {
    type Reader = IoReader<ReadHalf<DuplexStream>>;
    type Writer = IoWriter<WriteHalf<DuplexStream>>;

    fn peer(&self) -> String {
        "in-memory".to_string()
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        let (read_half, write_half) = tokio::io::split(self);
        (IoReader::new(read_half), IoWriter::new(write_half))
    }
}

/// Dials unencrypted TCP streams to one fixed target address
#[derive(Debug, Clone)]
pub struct TcpConnector {
    target: String,
}

impl TcpConnector {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let stream = TcpStream::connect(self.target.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> Result<TcpStream, TransportError> {
        let (stream, _) = TcpListener::accept(self).await?;
        Ok(stream)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// The process's standard input and output as one duplex stream
pub struct StdioStream {
    stdin: tokio::io::Stdin,
    stdout: tokio::io::Stdout,
}

impl StdioStream {
    pub fn new() -> Self {
        Self {
            stdin: tokio::io::stdin(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdioStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for StdioStream {
    type Reader = IoReader<tokio::io::Stdin>;
    type Writer = IoWriter<tokio::io::Stdout>;

    fn peer(&self) -> String {
        "stdio".to_string()
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        (IoReader::new(self.stdin), IoWriter::new(self.stdout))
    }
}
