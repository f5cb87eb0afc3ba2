//! Dispatch stage: admits queued connections and forwards each one

use std::sync::Arc;

use sp_core::traits::{Connector, Stream, StreamWriter};
use sp_core::{Deadline, Session, SessionId};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::admission::{AdmissionController, AdmissionToken};

pub(super) struct Dispatcher<N, C> {
    waiting: mpsc::Receiver<N>,
    connector: Arc<C>,
    admission: AdmissionController,
    deadline: Deadline,
    cancel: CancellationToken,
}

impl<N, C> Dispatcher<N, C>
where
    N: Stream,
    C: Connector,
{
    pub(super) fn new(
        waiting: mpsc::Receiver<N>,
        connector: Arc<C>,
        admission: AdmissionController,
        deadline: Deadline,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            waiting,
            connector,
            admission,
            deadline,
            cancel,
        }
    }

    pub(super) async fn run(mut self) {
        let mut sessions = JoinSet::new();

        loop {
            let near = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = self.waiting.recv() => match next {
                    Some(near) => near,
                    None => break,
                },
            };

            let token = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                token = self.admission.acquire() => match token {
                    Some(token) => token,
                    None => break,
                },
            };
            tracing::debug!(
                "Admitted {} ({}/{} in flight)",
                near.peer(),
                self.admission.in_flight(),
                self.admission.capacity()
            );

            sessions.spawn(forward(
                near,
                Arc::clone(&self.connector),
                token,
                self.deadline,
                self.cancel.clone(),
            ));

            while let Some(finished) = sessions.try_join_next() {
                log_task_failure(finished);
            }
        }

        self.admission.close();
        if !sessions.is_empty() {
            tracing::info!("Waiting for {} sessions to finish", sessions.len());
        }
        while let Some(finished) = sessions.join_next().await {
            log_task_failure(finished);
        }
    }
}

fn log_task_failure(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        tracing::error!("Session task failed: {}", e);
    }
}

/// Dial the target, run the session, then release the slot
async fn forward<N, C>(
    near: N,
    connector: Arc<C>,
    token: AdmissionToken,
    deadline: Deadline,
    shutdown: CancellationToken,
) where
    N: Stream,
    C: Connector,
{
    let peer = near.peer();

    let dialed = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            drop(token);
            close_near(near, &peer).await;
            return;
        }
        dialed = connector.connect() => dialed,
    };

    match dialed {
        Ok(far) => {
            let id = SessionId::next();
            tracing::debug!("{}: {} -> {}", id, peer, connector.target());

            let report = Session::new(id, near, far, deadline)
                .with_shutdown(&shutdown)
                .run()
                .await;
            for (direction, e) in report.errors() {
                tracing::warn!("{} {} ({}): {}", id, direction, peer, e);
            }
            drop(token);
        }
        Err(e) => {
            tracing::warn!("Failed to dial {} for {}: {}", connector.target(), peer, e);
            drop(token);
            close_near(near, &peer).await;
        }
    }

    tracing::info!("Closed connection: {}", peer);
}

/// Close a near stream that never became part of a session
async fn close_near<N: Stream>(near: N, peer: &str) {
    let (_reader, mut writer) = near.into_split();
    if let Err(e) = writer.close().await {
        tracing::debug!("Closing {} failed: {}", peer, e);
    }
}
