//! Core trait definitions

mod stream;
mod transport;

pub use stream::{Stream, StreamReader, StreamWriter};
pub use transport::{Acceptor, Connector};
