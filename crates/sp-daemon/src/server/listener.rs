//! Accept loop

use std::sync::Arc;

use sp_core::traits::{Acceptor, Connector, Stream};
use sp_core::Deadline;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use crate::admission::AdmissionController;

/// Server that accepts near streams and forwards each to the target
pub struct ProxyServer<A, C> {
    acceptor: A,
    connector: Arc<C>,
    admission: AdmissionController,
    deadline: Deadline,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl<A, C> ProxyServer<A, C>
where
    A: Acceptor,
    C: Connector,
{
    pub fn new(
        acceptor: A,
        connector: C,
        admission: AdmissionController,
        deadline: Deadline,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            acceptor,
            connector: Arc::new(connector),
            admission,
            deadline,
            cancel,
        }
    }

    /// Accept until cancelled, then wait for in-flight sessions to finish
    pub async fn run(mut self) {
        match self.acceptor.local_addr() {
            Ok(addr) => tracing::info!(
                "Listening on {}, forwarding to {} (max {} connections)",
                addr,
                self.connector.target(),
                self.admission.capacity()
            ),
            Err(e) => tracing::warn!("Could not read listener address: {}", e),
        }

        let (waiting_tx, waiting_rx) = mpsc::channel::<A::Stream>(self.admission.capacity());
        let dispatcher = tokio::spawn(
            Dispatcher::new(
                waiting_rx,
                Arc::clone(&self.connector),
                self.admission.clone(),
                self.deadline,
                self.cancel.clone(),
            )
            .run(),
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!("Server shutting down");
                    break;
                }

                result = self.acceptor.accept() => {
                    let stream = match result {
                        Ok(stream) => stream,
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };
                    tracing::info!("Received connection: {}", stream.peer());

                    // Blocks while the dispatch queue is full
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            tracing::info!("Server shutting down");
                            break;
                        }
                        sent = waiting_tx.send(stream) => {
                            if sent.is_err() {
                                tracing::error!("Dispatcher stopped unexpectedly");
                                break;
                            }
                        }
                    }
                }
            }
        }

        drop(waiting_tx);
        if let Err(e) = dispatcher.await {
            tracing::error!("Dispatcher task failed: {}", e);
        }
        tracing::info!("All sessions finished");
    }
}
