//! sp-daemon: the `spiped` forwarding daemon
//!
//! The daemon accepts secure connections on a source address and forwards
//! each one to a fixed target over a fresh secure stream, running at most
//! a configured number of sessions at once.

pub mod admission;
pub mod server;

pub use admission::{AdmissionController, AdmissionToken};
pub use server::ProxyServer;
