//! Observing and controlling a turn while it runs.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::session::{SessionInner, StopOnDrop};
use crate::error::{AgentError, Result};
use crate::stream::PartialValueStage;
use crate::types::{Completion, StreamEvent, StreamOptions, TokenEvent};

/// A turn running in the background.
///
/// Tokens are read through [`events`](Self::events); the final result through
/// [`completion`](Self::completion), which awaits every round of the turn.
/// Dropping the handle, or the `completion` future, before the turn finishes
/// stops it.
pub struct TurnStream {
    inner: Arc<SessionInner>,
    turn_id: Uuid,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedReceiver<TokenEvent>>,
    task: Option<JoinHandle<Result<Completion>>>,
    options: StreamOptions,
}

impl TurnStream {
    pub(crate) fn new(
        inner: Arc<SessionInner>,
        turn_id: Uuid,
        cancel: CancellationToken,
        events: mpsc::UnboundedReceiver<TokenEvent>,
        task: JoinHandle<Result<Completion>>,
        options: StreamOptions,
    ) -> Self {
        Self {
            inner,
            turn_id,
            cancel,
            events: Some(events),
            task: Some(task),
            options,
        }
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    /// Token events in generation order. Ends when the turn finishes or is
    /// stopped; nothing is yielded after a stop. Only the first call returns
    /// the turn's events, later calls get an empty stream.
    pub fn events(&mut self) -> BoxStream<'static, StreamEvent> {
        let receiver = self.events.take();
        let cancel = self.cancel.clone();
        let partial_values = self.options.partial_values;

        Box::pin(async_stream::stream! {
            if let Some(receiver) = receiver {
                let mut tokens = UnboundedReceiverStream::new(receiver);
                let mut stage = PartialValueStage::new();
                loop {
                    let token = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        next = tokens.next() => match next {
                            Some(token) => token,
                            None => break,
                        },
                    };
                    let partial = if partial_values { stage.push(&token) } else { None };
                    yield StreamEvent { token, partial };
                }
            }
        })
    }

    /// Stop this turn. Has no effect once it has finished.
    pub fn stop(&self) -> bool {
        self.inner.stop_turn(Some(self.turn_id))
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the whole turn. Token events not yet taken through
    /// [`events`](Self::events) are discarded from here on.
    pub async fn completion(mut self) -> Result<Completion> {
        self.events = None;
        let Some(task) = self.task.take() else {
            return Err(AgentError::InvalidState("turn result already taken".into()));
        };
        let guard = StopOnDrop::new(Arc::clone(&self.inner), self.turn_id);
        let joined = task.await;
        guard.disarm();
        match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(AgentError::Cancelled),
            Err(err) => Err(AgentError::backend_with_source("turn task panicked", err)),
        }
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.inner.stop_turn(Some(self.turn_id));
        }
    }
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("turn_id", &self.turn_id)
            .field("stopped", &self.is_stopped())
            .field("options", &self.options)
            .finish()
    }
}
