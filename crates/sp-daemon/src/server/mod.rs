//! Forwarding server
//!
//! The accept loop ([`ProxyServer`]) hands inbound streams to a dispatch
//! stage over a channel bounded to the admission capacity. Dispatch holds
//! each stream until a session slot is free, then forwards it on its own
//! task. When the channel is full the accept loop stops accepting.

mod dispatch;
mod listener;

pub use listener::ProxyServer;
