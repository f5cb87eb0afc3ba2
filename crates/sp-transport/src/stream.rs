//! Secure stream dial/listen primitives

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, Bytes};
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::cipher::RecordCipher;
use crate::codec::{Record, RecordCodec};
use crate::error::TransportError;
use crate::frame::MAX_PLAINTEXT_SIZE;
use crate::handshake::{self, Role};
use crate::key::SharedKey;

/// Tunables for establishing secure streams
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Upper bound on TCP connect plus handshake
    pub handshake_timeout: Duration,
    /// Inbound handshakes allowed in flight before the listener stops accepting
    pub max_pending_handshakes: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            max_pending_handshakes: 128,
        }
    }
}

/// An authenticated, encrypted duplex byte stream
pub struct SecureStream {
    reader: SecureReader,
    writer: SecureWriter,
    peer_addr: SocketAddr,
}

impl SecureStream {
    async fn establish(
        socket: TcpStream,
        peer_addr: SocketAddr,
        key: &SharedKey,
        role: Role,
    ) -> Result<Self, TransportError> {
        socket.set_nodelay(true)?;
        let (read_half, write_half) = socket.into_split();
        let mut framed_read = FramedRead::new(read_half, RecordCodec::new());
        let mut framed_write = FramedWrite::new(write_half, RecordCodec::new());

        let ciphers = handshake::perform(role, key, &mut framed_read, &mut framed_write).await?;
        tracing::debug!("Handshake with {} complete ({:?})", peer_addr, role);

        Ok(Self {
            reader: SecureReader {
                inner: framed_read,
                cipher: ciphers.inbound,
                pending: Bytes::new(),
            },
            writer: SecureWriter {
                inner: framed_write,
                cipher: ciphers.outbound,
            },
            peer_addr,
        })
    }

    /// Address of the remote end
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Split into independently owned read and write halves
    pub fn into_split(self) -> (SecureReader, SecureWriter) {
        (self.reader, self.writer)
    }
}

/// Read half of a [`SecureStream`]
pub struct SecureReader {
    inner: FramedRead<OwnedReadHalf, RecordCodec>,
    cipher: RecordCipher,
    /// Decrypted bytes not yet handed to the caller
    pending: Bytes,
}

impl SecureReader {
    /// Read decrypted bytes into `buf`
    ///
    /// Returns `Ok(0)` once the peer has closed the stream (for a non-empty
    /// `buf`). Cancel safe: if the future is dropped before completion no
    /// data is lost.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            match self.inner.next().await {
                Some(Ok(Record::Sealed(ciphertext))) => {
                    self.pending = self.cipher.open(&ciphertext)?;
                }
                Some(Ok(other)) => return Err(TransportError::UnexpectedRecord(other.name())),
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

/// Write half of a [`SecureStream`]
pub struct SecureWriter {
    inner: FramedWrite<OwnedWriteHalf, RecordCodec>,
    cipher: RecordCipher,
}

impl SecureWriter {
    /// Encrypt and send all of `buf`, returning the number of bytes accepted
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        for chunk in buf.chunks(MAX_PLAINTEXT_SIZE) {
            let sealed = self.cipher.seal(chunk)?;
            self.inner.feed(Record::Sealed(sealed)).await?;
        }
        self.inner.flush().await?;
        Ok(buf.len())
    }

    /// Flush pending records and shut down the write direction
    ///
    /// Waits for the peer to take every buffered record, so this can block
    /// for as long as the peer stops reading.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await
    }

    /// Shut down the write direction, discarding any records still buffered
    ///
    /// Used after an interrupted `write`, where flushing could wait forever
    /// on a peer that no longer reads.
    pub async fn abort(&mut self) -> Result<(), TransportError> {
        tokio::io::AsyncWriteExt::shutdown(self.inner.get_mut()).await?;
        Ok(())
    }
}

/// Dial `address` and run the initiator handshake
pub async fn dial<A>(
    key: &SharedKey,
    address: A,
    options: &TransportOptions,
) -> Result<SecureStream, TransportError>
where
    A: ToSocketAddrs,
{
    let limit = options.handshake_timeout;
    let connect = async {
        let socket = TcpStream::connect(address).await?;
        let peer_addr = socket.peer_addr()?;
        SecureStream::establish(socket, peer_addr, key, Role::Initiator).await
    };

    tokio::time::timeout(limit, connect)
        .await
        .map_err(|_| TransportError::HandshakeTimeout(limit))?
}

/// Listener producing authenticated inbound secure streams
///
/// Handshakes run concurrently in the background so one slow peer cannot
/// hold up the others; `accept` returns streams in completion order.
pub struct SecureListener {
    listener: TcpListener,
    key: SharedKey,
    options: TransportOptions,
    handshakes: JoinSet<Result<SecureStream, TransportError>>,
}

impl SecureListener {
    /// Bind a listener on `address`
    pub async fn bind<A>(
        key: SharedKey,
        address: A,
        options: TransportOptions,
    ) -> Result<Self, TransportError>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            key,
            options,
            handshakes: JoinSet::new(),
        })
    }

    /// Local address the listener is bound to
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Wait for the next inbound stream to finish its handshake
    ///
    /// A failed handshake is returned as an error carrying the peer address;
    /// the listener stays usable. Cancel safe.
    pub async fn accept(&mut self) -> Result<SecureStream, TransportError> {
        loop {
            let accepting = self.handshakes.len() < self.options.max_pending_handshakes.max(1);

            tokio::select! {
                Some(joined) = self.handshakes.join_next() => {
                    return match joined {
                        Ok(result) => result,
                        Err(e) => Err(TransportError::Io(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!("handshake task failed: {}", e),
                        ))),
                    };
                }
                accepted = self.listener.accept(), if accepting => {
                    let (socket, peer_addr) = accepted?;
                    tracing::trace!("TCP connection from {}", peer_addr);

                    let key = self.key.clone();
                    let limit = self.options.handshake_timeout;
                    self.handshakes.spawn(async move {
                        let establish = SecureStream::establish(socket, peer_addr, &key, Role::Responder);
                        match tokio::time::timeout(limit, establish).await {
                            Ok(Ok(stream)) => Ok(stream),
                            Ok(Err(e)) => Err(e.during_handshake_with(peer_addr)),
                            Err(_) => Err(TransportError::HandshakeTimeout(limit)
                                .during_handshake_with(peer_addr)),
                        }
                    });
                }
            }
        }
    }
}
