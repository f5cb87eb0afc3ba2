//! Stream traits

use async_trait::async_trait;

use crate::error::RelayError;

/// Read half of a duplex byte stream
#[async_trait]
pub trait StreamReader: Send {
    /// Read up to `buf.len()` bytes
    ///
    /// `Ok(0)` is an empty read and says nothing about the stream ending;
    /// end of stream is reported as [`RelayError::Eof`].
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RelayError>;
}

/// Write half of a duplex byte stream
#[async_trait]
pub trait StreamWriter: Send {
    /// Write `buf`, returning how many bytes were accepted
    async fn write(&mut self, buf: &[u8]) -> Result<usize, RelayError>;

    /// Flush and close the stream
    async fn close(&mut self) -> Result<(), RelayError>;

    /// Close without waiting for buffered data to drain
    ///
    /// Called instead of [`close`](Self::close) once a write has been
    /// interrupted, or when closing takes too long. Writers that keep no
    /// buffer of their own are released by dropping them.
    async fn abort(&mut self) -> Result<(), RelayError> {
        Ok(())
    }
}

/// Duplex byte stream that can be split into independently owned halves
///
/// Dropping both halves releases the underlying resource; a session calls
/// [`StreamWriter::close`] exactly once before doing so.
pub trait Stream: Send + 'static {
    /// Read half type
    type Reader: StreamReader + 'static;
    /// Write half type
    type Writer: StreamWriter + 'static;

    /// Human-readable description of the remote end, for logs
    fn peer(&self) -> String;

    /// Split into read and write halves
    fn into_split(self) -> (Self::Reader, Self::Writer);
}
