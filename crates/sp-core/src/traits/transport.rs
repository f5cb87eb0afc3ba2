//! Transport traits

use std::net::SocketAddr;

use async_trait::async_trait;
use sp_transport::TransportError;

use super::Stream;

/// Opens far-side streams to a fixed target
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced
    type Stream: Stream;

    /// Dial the target
    async fn connect(&self) -> Result<Self::Stream, TransportError>;

    /// Target address, for logs
    fn target(&self) -> &str;
}

/// Accepts inbound near-side streams
#[async_trait]
pub trait Acceptor: Send + 'static {
    /// Stream type produced
    type Stream: Stream;

    /// Wait for the next inbound stream
    ///
    /// Must be cancel safe: dropping the future loses no connection.
    async fn accept(&mut self) -> Result<Self::Stream, TransportError>;

    /// Address the acceptor is listening on
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}
