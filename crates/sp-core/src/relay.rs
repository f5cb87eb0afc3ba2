//! Unidirectional byte relay
//!
//! A [`Relay`] pumps bytes from one stream's read half into another
//! stream's write half, one chunk at a time, until the source ends, an
//! operation fails or its sibling asks it to stop.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::traits::{StreamReader, StreamWriter};
use crate::types::{Deadline, Direction};

/// Largest chunk read from the source in one operation
pub const CHUNK_SIZE: usize = 1024;

/// How a relay stopped
#[derive(Debug)]
pub enum RelayOutcome {
    /// A read or write ended the relay (end of stream included)
    Ended(RelayError),
    /// The sibling direction finished first
    Cancelled,
}

/// Result of one relay run
#[derive(Debug)]
pub struct RelayReport {
    /// Direction this relay moved bytes in
    pub direction: Direction,
    /// Bytes fully written to the destination
    pub bytes: u64,
    /// Why the relay stopped
    pub outcome: RelayOutcome,
    /// The relay stopped partway through a write, so the destination may
    /// still hold data it could not deliver
    pub write_interrupted: bool,
}

impl RelayReport {
    /// The error worth reporting to an operator, if any
    ///
    /// End of stream and cancellation are normal ways for a direction to
    /// finish and return `None`.
    pub fn error(&self) -> Option<&RelayError> {
        match &self.outcome {
            RelayOutcome::Ended(e) if !e.is_graceful() => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RelayOutcome::Cancelled)
    }
}

/// One direction of a session
pub struct Relay<R, W> {
    direction: Direction,
    source: R,
    destination: W,
    deadline: Deadline,
    /// Set by the sibling when it finishes
    stop: CancellationToken,
    /// Set by this relay when it finishes
    sibling: CancellationToken,
}

enum Step<T> {
    Done(Result<T, RelayError>),
    Cancelled,
}

impl<R, W> Relay<R, W>
where
    R: StreamReader,
    W: StreamWriter,
{
    pub fn new(
        direction: Direction,
        source: R,
        destination: W,
        deadline: Deadline,
        stop: CancellationToken,
        sibling: CancellationToken,
    ) -> Self {
        Self {
            direction,
            source,
            destination,
            deadline,
            stop,
            sibling,
        }
    }

    /// Pump bytes until the relay ends, returning its report and both halves
    ///
    /// The sibling is signalled on every exit path, including a panic while
    /// the relay is running.
    pub async fn run(mut self) -> (RelayReport, R, W) {
        let _signal_sibling = self.sibling.clone().drop_guard();

        let mut buf = [0u8; CHUNK_SIZE];
        let mut bytes = 0u64;
        let mut write_interrupted = false;

        let outcome = loop {
            let n = match guarded(&self.stop, self.deadline, self.source.read(&mut buf)).await {
                Step::Done(Ok(n)) => n,
                Step::Done(Err(e)) => break RelayOutcome::Ended(e),
                Step::Cancelled => break RelayOutcome::Cancelled,
            };

            // An empty read is not the end of the stream
            if n == 0 {
                continue;
            }

            match guarded(&self.stop, self.deadline, self.destination.write(&buf[..n])).await {
                Step::Done(Ok(written)) if written == n => {
                    bytes += n as u64;
                    tracing::trace!("{}: {} bytes", self.direction, n);
                }
                Step::Done(Ok(written)) => {
                    break RelayOutcome::Ended(RelayError::ShortWrite {
                        expected: n,
                        written,
                    })
                }
                Step::Done(Err(e)) => {
                    write_interrupted = true;
                    break RelayOutcome::Ended(e);
                }
                Step::Cancelled => {
                    write_interrupted = true;
                    break RelayOutcome::Cancelled;
                }
            }
        };

        let report = RelayReport {
            direction: self.direction,
            bytes,
            outcome,
            write_interrupted,
        };
        (report, self.source, self.destination)
    }
}

/// Run one stream operation under the deadline, abandoning it on cancellation
async fn guarded<T, F>(stop: &CancellationToken, deadline: Deadline, op: F) -> Step<T>
where
    F: Future<Output = Result<T, RelayError>>,
{
    if stop.is_cancelled() {
        return Step::Cancelled;
    }

    let op = async {
        match deadline.limit() {
            Some(limit) => match tokio::time::timeout(limit, op).await {
                Ok(result) => result,
                Err(_) => Err(RelayError::TimedOut(limit)),
            },
            None => op.await,
        }
    };

    tokio::select! {
        biased;
        _ = stop.cancelled() => Step::Cancelled,
        result = op => Step::Done(result),
    }
}
