//! Request/response channel in front of the dispatcher.
//!
//! Any number of [`WorkerClient`] clones may submit events; a single
//! [`WorkerServer`] loop handles them in arrival order and replies on each
//! request's oneshot once the handler has settled.

use crate::error::{Result, WorkerError};
use crate::worker::dispatcher::WorkerDispatcher;
use crate::worker::events::{EventOutcome, WorkerEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

struct WorkerRequest {
    event: WorkerEvent,
    response_tx: oneshot::Sender<Result<EventOutcome>>,
}

#[derive(Clone)]
pub struct WorkerClient {
    request_tx: mpsc::Sender<WorkerRequest>,
}

impl WorkerClient {
    /// Submit an event and wait until it has been fully handled.
    pub async fn send(&self, event: WorkerEvent) -> Result<EventOutcome> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(WorkerRequest { event, response_tx })
            .await
            .map_err(|e| WorkerError::Channel(format!("failed to send worker event: {e}")))?;

        response_rx
            .await
            .map_err(|e| WorkerError::Channel(format!("worker event response dropped: {e}")))?
    }
}

pub struct WorkerServer {
    request_rx: mpsc::Receiver<WorkerRequest>,
    dispatcher: WorkerDispatcher,
}

#[must_use]
pub fn worker_channel(
    request_capacity: usize,
    dispatcher: WorkerDispatcher,
) -> (WorkerClient, WorkerServer) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (
        WorkerClient { request_tx },
        WorkerServer {
            request_rx,
            dispatcher,
        },
    )
}

impl WorkerServer {
    /// Handle events until every client has been dropped, then hand the
    /// dispatcher back.
    pub async fn run(mut self) -> WorkerDispatcher {
        while let Some(request) = self.request_rx.recv().await {
            let outcome = self.dispatcher.dispatch(request.event).await;
            if request.response_tx.send(outcome).is_err() {
                debug!("worker client stopped waiting for a response");
            }
        }
        self.dispatcher
    }
}
