//! sp-pipe: the `spipe` client
//!
//! Pairs one local stream (normally the process's standard input and
//! output) with one dialed secure stream, and relays until either side
//! closes.

use sp_core::traits::{Connector, Stream, StreamWriter};
use sp_core::{Deadline, Session, SessionId, SessionReport, SpError};

/// Dial the far end and relay between it and `near` until the session ends
///
/// A failed dial closes `near` and is returned as an error; once the session
/// has started its outcome is described by the report instead.
pub async fn run_pipe<N, C>(
    near: N,
    connector: &C,
    deadline: Deadline,
) -> Result<SessionReport, SpError>
where
    N: Stream,
    C: Connector,
{
    let far = match connector.connect().await {
        Ok(far) => far,
        Err(e) => {
            let peer = near.peer();
            let (_reader, mut writer) = near.into_split();
            if let Err(close_err) = writer.close().await {
                tracing::debug!("Closing {} failed: {}", peer, close_err);
            }
            return Err(e.into());
        }
    };
    tracing::debug!("Connected to {}", far.peer());

    Ok(Session::new(SessionId::next(), near, far, deadline).run().await)
}

/// Log each non-graceful error in `report`; returns whether there were none
pub fn log_errors(report: &SessionReport) -> bool {
    let mut clean = true;
    for (direction, e) in report.errors() {
        tracing::error!("{}: {}", direction, e);
        clean = false;
    }
    clean
}
