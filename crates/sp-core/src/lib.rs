//! sp-core: Relay engine and shared configuration for spipe
//!
//! This crate provides the stream abstractions, the unidirectional relay,
//! the two-relay session that pairs a near and a far stream, and the
//! configuration structures used by the pipe and daemon binaries.

pub mod config;
pub mod error;
pub mod io;
pub mod relay;
pub mod secure;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{ConfigError, RelayError, SpError};
pub use relay::{Relay, RelayOutcome, RelayReport, CHUNK_SIZE};
pub use session::{Session, SessionReport};
pub use types::{Deadline, Direction, SessionId};
