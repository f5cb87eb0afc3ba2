//! Bidirectional session pairing two streams
//!
//! A [`Session`] owns a *near* and a *far* stream and runs two relays on
//! their own tasks: near→far (outbound) and far→near (inbound). When either
//! relay finishes it cancels the other, and once both have reported the
//! session closes each stream exactly once.

use std::time::Duration;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::relay::{Relay, RelayOutcome, RelayReport};
use crate::traits::{Stream, StreamWriter};
use crate::types::{Deadline, Direction, SessionId};

/// Longest a graceful close may take when the session has no deadline
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Outcome of a finished session
#[derive(Debug)]
pub struct SessionReport {
    /// Session identifier
    pub id: SessionId,
    /// Near→far direction
    pub outbound: RelayReport,
    /// Far→near direction
    pub inbound: RelayReport,
}

impl SessionReport {
    /// Non-graceful errors from either direction
    pub fn errors(&self) -> impl Iterator<Item = (Direction, &RelayError)> {
        [&self.outbound, &self.inbound]
            .into_iter()
            .filter_map(|report| report.error().map(|e| (report.direction, e)))
    }

    /// Whether both directions ended without a reportable error
    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }
}

/// A paired near/far stream forwarding unit
pub struct Session<N, F> {
    id: SessionId,
    near: N,
    far: F,
    deadline: Deadline,
    shutdown: CancellationToken,
}

impl<N, F> Session<N, F>
where
    N: Stream,
    F: Stream,
{
    /// Create a session over two already-open streams
    pub fn new(id: SessionId, near: N, far: F, deadline: Deadline) -> Self {
        Self {
            id,
            near,
            far,
            deadline,
            shutdown: CancellationToken::new(),
        }
    }

    /// Tie both directions to a parent token; cancelling it ends the session
    pub fn with_shutdown(mut self, shutdown: &CancellationToken) -> Self {
        self.shutdown = shutdown.child_token();
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Relay in both directions until both have finished
    ///
    /// Both streams are closed before this returns, whatever the outcome.
    /// A stream whose last write was interrupted is aborted rather than
    /// flushed, and a graceful close is bounded by the deadline (or
    /// [`CLOSE_GRACE`] without one) before falling back to an abort.
    pub async fn run(self) -> SessionReport {
        let id = self.id;
        let close_limit = self.deadline.limit().unwrap_or(CLOSE_GRACE);
        let near_peer = self.near.peer();
        let far_peer = self.far.peer();
        tracing::debug!(
            "{}: pairing {} <-> {} (deadline {})",
            id,
            near_peer,
            far_peer,
            self.deadline
        );

        let (near_reader, near_writer) = self.near.into_split();
        let (far_reader, far_writer) = self.far.into_split();

        // Each direction watches its own token and trips the other's
        let outbound_stop = self.shutdown.child_token();
        let inbound_stop = self.shutdown.child_token();

        let outbound = tokio::spawn(
            Relay::new(
                Direction::Outbound,
                near_reader,
                far_writer,
                self.deadline,
                outbound_stop.clone(),
                inbound_stop.clone(),
            )
            .run(),
        );
        let inbound = tokio::spawn(
            Relay::new(
                Direction::Inbound,
                far_reader,
                near_writer,
                self.deadline,
                inbound_stop.clone(),
                outbound_stop.clone(),
            )
            .run(),
        );

        let (outbound, inbound) = tokio::join!(outbound, inbound);

        // A relay that panicked dropped its halves, which closes them
        let (outbound, _near_reader, far_writer) =
            unpack(outbound, Direction::Outbound, &inbound_stop);
        let (inbound, _far_reader, near_writer) =
            unpack(inbound, Direction::Inbound, &outbound_stop);

        tokio::join!(
            close(id, "near", &near_peer, near_writer, inbound.write_interrupted, close_limit),
            close(id, "far", &far_peer, far_writer, outbound.write_interrupted, close_limit),
        );

        tracing::debug!(
            "{}: finished ({} bytes out: {}, {} bytes in: {})",
            id,
            outbound.bytes,
            describe(&outbound),
            inbound.bytes,
            describe(&inbound)
        );

        SessionReport {
            id,
            outbound,
            inbound,
        }
    }
}

type Joined<R, W> = Result<(RelayReport, R, W), JoinError>;

fn unpack<R, W>(
    joined: Joined<R, W>,
    direction: Direction,
    sibling: &CancellationToken,
) -> (RelayReport, Option<R>, Option<W>) {
    match joined {
        Ok((report, reader, writer)) => (report, Some(reader), Some(writer)),
        Err(e) => {
            sibling.cancel();
            let report = RelayReport {
                direction,
                bytes: 0,
                outcome: RelayOutcome::Ended(RelayError::TaskFailed(e.to_string())),
                write_interrupted: true,
            };
            (report, None, None)
        }
    }
}

async fn close<W: StreamWriter>(
    id: SessionId,
    side: &str,
    peer: &str,
    writer: Option<W>,
    interrupted: bool,
    limit: Duration,
) {
    let Some(mut writer) = writer else {
        return;
    };

    if !interrupted {
        match tokio::time::timeout(limit, writer.close()).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                tracing::debug!("{}: closing {} stream {} failed: {}", id, side, peer, e);
                return;
            }
            Err(_) => {
                tracing::debug!(
                    "{}: closing {} stream {} took over {:?}, aborting",
                    id,
                    side,
                    peer,
                    limit
                );
            }
        }
    }

    if let Err(e) = writer.abort().await {
        tracing::debug!("{}: aborting {} stream {} failed: {}", id, side, peer, e);
    }
}

fn describe(report: &RelayReport) -> String {
    match &report.outcome {
        RelayOutcome::Ended(e) => e.to_string(),
        RelayOutcome::Cancelled => "cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StreamReader;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn pair() -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(16 * 1024)
    }

    async fn read_to_end(stream: &mut DuplexStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_lossless_both_directions() {
        let (near, mut near_peer) = pair();
        let (far, mut far_peer) = pair();

        let session = tokio::spawn(Session::new(SessionId::next(), near, far, Deadline::NONE).run());

        let upstream: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let downstream: Vec<u8> = (0..7000u32).map(|i| (i * 7 % 256) as u8).collect();

        near_peer.write_all(&upstream).await.unwrap();
        let mut received_far = vec![0u8; upstream.len()];
        far_peer.read_exact(&mut received_far).await.unwrap();
        assert_eq!(received_far, upstream);

        far_peer.write_all(&downstream).await.unwrap();
        let mut received_near = vec![0u8; downstream.len()];
        near_peer.read_exact(&mut received_near).await.unwrap();
        assert_eq!(received_near, downstream);

        // Far side closes: the whole session winds down
        far_peer.shutdown().await.unwrap();
        let report = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.outbound.bytes, upstream.len() as u64);
        assert_eq!(report.inbound.bytes, downstream.len() as u64);
        assert!(matches!(report.inbound.outcome, RelayOutcome::Ended(RelayError::Eof)));
        assert!(report.outbound.is_cancelled());
        assert!(report.is_clean());

        // Near stream was closed by the session
        assert!(read_to_end(&mut near_peer).await.is_empty());
    }

    #[tokio::test]
    async fn test_near_close_closes_far() {
        let (near, mut near_peer) = pair();
        let (far, mut far_peer) = pair();

        let session = tokio::spawn(Session::new(SessionId::next(), near, far, Deadline::NONE).run());

        near_peer.write_all(b"last words").await.unwrap();
        near_peer.shutdown().await.unwrap();

        // Far peer sees the data, then end of stream
        assert_eq!(read_to_end(&mut far_peer).await, b"last words");

        let report = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        assert!(report.is_clean());
        assert!(report.inbound.is_cancelled());
    }

    #[tokio::test]
    async fn test_peer_drop_ends_session() {
        let (near, near_peer) = pair();
        let (far, mut far_peer) = pair();

        let session = tokio::spawn(Session::new(SessionId::next(), near, far, Deadline::NONE).run());

        drop(near_peer);

        tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        assert!(read_to_end(&mut far_peer).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out_and_closes_both() {
        let (near, mut near_peer) = pair();
        let (far, mut far_peer) = pair();

        let report = Session::new(SessionId::next(), near, far, Deadline::from_secs(1))
            .run()
            .await;

        let timed_out = report
            .errors()
            .filter(|(_, e)| matches!(e, RelayError::TimedOut(_)))
            .count();
        assert!(timed_out >= 1);

        assert!(read_to_end(&mut near_peer).await.is_empty());
        assert!(read_to_end(&mut far_peer).await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_token_cancels_both_directions() {
        let (near, _near_peer) = pair();
        let (far, _far_peer) = pair();
        let shutdown = CancellationToken::new();

        let session = tokio::spawn(
            Session::new(SessionId::next(), near, far, Deadline::NONE)
                .with_shutdown(&shutdown)
                .run(),
        );

        tokio::task::yield_now().await;
        shutdown.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap();
        assert!(report.outbound.is_cancelled());
        assert!(report.inbound.is_cancelled());
    }

    #[tokio::test]
    async fn test_both_sides_closing_at_once() {
        for _ in 0..50 {
            let (near, mut near_peer) = pair();
            let (far, mut far_peer) = pair();

            let session =
                tokio::spawn(Session::new(SessionId::next(), near, far, Deadline::NONE).run());

            let (a, b) = tokio::join!(near_peer.shutdown(), far_peer.shutdown());
            a.unwrap();
            b.unwrap();

            let report = tokio::time::timeout(Duration::from_secs(5), session)
                .await
                .expect("session deadlocked")
                .unwrap();
            assert!(report.is_clean());
        }
    }

    /// Far end that has stopped reading
    ///
    /// Reads block until `hangup` fires and then report end of stream. A
    /// graceful close never completes; an abort does.
    struct StalledStream {
        hangup: CancellationToken,
        stall_writes: bool,
        closed: Arc<AtomicBool>,
        aborted: Arc<AtomicBool>,
    }

    impl StalledStream {
        fn new(stall_writes: bool) -> Self {
            Self {
                hangup: CancellationToken::new(),
                stall_writes,
                closed: Arc::new(AtomicBool::new(false)),
                aborted: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    struct StalledReader {
        hangup: CancellationToken,
    }

    struct StalledWriter {
        stall_writes: bool,
        closed: Arc<AtomicBool>,
        aborted: Arc<AtomicBool>,
    }

    #[async_trait]
    impl StreamReader for StalledReader {
        async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, RelayError> {
            self.hangup.cancelled().await;
            Err(RelayError::Eof)
        }
    }

    #[async_trait]
    impl StreamWriter for StalledWriter {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, RelayError> {
            if self.stall_writes {
                return std::future::pending().await;
            }
            Ok(buf.len())
        }

        async fn close(&mut self) -> Result<(), RelayError> {
            self.closed.store(true, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn abort(&mut self) -> Result<(), RelayError> {
            self.aborted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Stream for StalledStream {
        type Reader = StalledReader;
        type Writer = StalledWriter;

        fn peer(&self) -> String {
            "stalled".to_string()
        }

        fn into_split(self) -> (StalledReader, StalledWriter) {
            (
                StalledReader {
                    hangup: self.hangup,
                },
                StalledWriter {
                    stall_writes: self.stall_writes,
                    closed: self.closed,
                    aborted: self.aborted,
                },
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_far_end_aborted_after_hangup() {
        let (near, mut near_peer) = pair();
        let far = StalledStream::new(true);
        let hangup = far.hangup.clone();
        let closed = Arc::clone(&far.closed);
        let aborted = Arc::clone(&far.aborted);

        let session = tokio::spawn(Session::new(SessionId::next(), near, far, Deadline::NONE).run());

        near_peer.write_all(b"never delivered").await.unwrap();
        // Let the outbound relay block in its write
        tokio::time::sleep(Duration::from_millis(10)).await;
        hangup.cancel();

        let report = tokio::time::timeout(Duration::from_secs(30), session)
            .await
            .expect("session stuck closing a stalled stream")
            .unwrap();

        assert!(report.outbound.write_interrupted);
        assert!(aborted.load(Ordering::SeqCst));
        assert!(!closed.load(Ordering::SeqCst));
        assert!(read_to_end(&mut near_peer).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_far_end_closed_within_deadline() {
        let (near, mut near_peer) = pair();
        let far = StalledStream::new(true);
        let aborted = Arc::clone(&far.aborted);

        near_peer.write_all(b"stuck behind a full buffer").await.unwrap();

        let started = tokio::time::Instant::now();
        let report = Session::new(SessionId::next(), near, far, Deadline::from_secs(1))
            .run()
            .await;

        assert!(started.elapsed() <= Duration::from_secs(2));
        assert!(report
            .errors()
            .any(|(_, e)| matches!(e, RelayError::TimedOut(_))));
        assert!(aborted.load(Ordering::SeqCst));
        assert!(read_to_end(&mut near_peer).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_close_falls_back_to_abort() {
        let (near, mut near_peer) = pair();
        let far = StalledStream::new(false);
        let closed = Arc::clone(&far.closed);
        let aborted = Arc::clone(&far.aborted);

        near_peer.write_all(b"delivered").await.unwrap();
        near_peer.shutdown().await.unwrap();

        let started = tokio::time::Instant::now();
        let report = Session::new(SessionId::next(), near, far, Deadline::from_secs(1))
            .run()
            .await;

        assert!(report.is_clean());
        assert!(!report.outbound.write_interrupted);
        // Graceful close was tried first and cut off at the deadline
        assert!(closed.load(Ordering::SeqCst));
        assert!(aborted.load(Ordering::SeqCst));
        assert!(started.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_close_without_deadline_uses_grace_period() {
        let (near, mut near_peer) = pair();
        let far = StalledStream::new(false);
        let aborted = Arc::clone(&far.aborted);

        near_peer.shutdown().await.unwrap();

        let started = tokio::time::Instant::now();
        Session::new(SessionId::next(), near, far, Deadline::NONE)
            .run()
            .await;

        assert!(aborted.load(Ordering::SeqCst));
        assert!(started.elapsed() >= CLOSE_GRACE);
        assert!(started.elapsed() < CLOSE_GRACE * 2);
    }
}
