//! Core domain types

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for a forwarding session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Create a session ID from a raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate the next unused session ID
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Direction a relay moves bytes in, relative to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Near stream to far stream
    Outbound,
    /// Far stream to near stream
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("near->far"),
            Direction::Inbound => f.write_str("far->near"),
        }
    }
}

/// Per-operation inactivity timeout
///
/// Applied afresh to every individual read and write; it never bounds the
/// total length of a session. A zero duration disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Duration>);

impl Deadline {
    /// No deadline: operations may block indefinitely
    pub const NONE: Deadline = Deadline(None);

    /// Deadline from a duration, zero meaning disabled
    pub fn new(limit: Duration) -> Self {
        if limit.is_zero() {
            Self::NONE
        } else {
            Self(Some(limit))
        }
    }

    /// Deadline from whole seconds, zero meaning disabled
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// The timeout to apply to the next operation, if any
    pub fn limit(&self) -> Option<Duration> {
        self.0
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(limit) => write!(f, "{:?}", limit),
            None => f.write_str("disabled"),
        }
    }
}
