//! The completion loop driving one turn.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::session::SessionInner;
use super::state::{TurnPhase, TurnStart};
use crate::backend::{BackendCompletion, CompletionRequest, TokenChunk, TokenSink};
use crate::error::{AgentError, Result};
use crate::types::{Completion, CompletionEntry, FunctionCall, FunctionReturn, Role, TokenEvent};

/// Drive a turn to completion and release the session.
pub(crate) async fn run(
    inner: Arc<SessionInner>,
    start: TurnStart,
    events: Option<mpsc::UnboundedSender<TokenEvent>>,
) -> Result<Completion> {
    let turn_id = start.id;
    let mut entries = vec![CompletionEntry::new(start.user.clone())];

    let outcome = drive(&inner, &start, &mut entries, events.as_ref()).await;
    match outcome {
        Ok(output) => match Completion::new(output, entries) {
            Ok(completion) => {
                inner.finish_turn(turn_id, None);
                Ok(completion)
            }
            Err(err) => {
                inner.finish_turn(turn_id, Some(&err));
                Err(err)
            }
        },
        Err(err) => {
            inner.finish_turn(turn_id, Some(&err));
            Err(err)
        }
    }
}

/// The round loop. Returns the final assistant text.
async fn drive(
    inner: &SessionInner,
    start: &TurnStart,
    entries: &mut Vec<CompletionEntry>,
    events: Option<&mpsc::UnboundedSender<TokenEvent>>,
) -> Result<String> {
    let max_rounds = inner.config.max_rounds;
    let cancel = &start.cancel;

    for round in 1..=max_rounds {
        if !inner.enter_phase(start.id, TurnPhase::AwaitingModel) {
            return Err(AgentError::Cancelled);
        }

        let request = CompletionRequest {
            messages: inner.messages(),
            options: inner.config.options.clone(),
            functions: inner.functions.definitions(),
        };
        let stream_id = Uuid::new_v4();
        tracing::debug!(
            turn_id = %start.id,
            round,
            messages = request.messages.len(),
            "requesting completion"
        );

        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = inner.backend.complete(request, token_sink(stream_id, start, events)) => result,
        };
        let generated = match generated {
            Ok(generated) => generated,
            Err(err) => {
                if !cancel.is_cancelled() {
                    inner.backend.stop();
                }
                return Err(err);
            }
        };

        let (output, calls) = append_continuation(inner, start.id, generated, entries)?;
        if calls.is_empty() {
            tracing::debug!(turn_id = %start.id, round, "no function calls, turn done");
            return Ok(output);
        }

        if !inner.enter_phase(start.id, TurnPhase::ExecutingFunctions) {
            return Err(AgentError::Cancelled);
        }
        let count = calls.len();
        tracing::debug!(turn_id = %start.id, round, calls = count, "executing function calls");
        let resolved = inner.functions.resolve_all(calls).map_err(|err| {
            tracing::warn!(turn_id = %start.id, error = %err, "function resolution failed");
            err
        })?;

        let returns = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = inner.executor.execute(resolved, cancel) => result?,
        };
        if returns.len() != count {
            return Err(AgentError::InvalidState(format!(
                "executor returned {} results for {count} calls",
                returns.len()
            )));
        }

        let messages = returns.into_iter().map(FunctionReturn::into_message).collect();
        let elements = inner.append_for_turn(start.id, messages)?;
        entries.extend(elements.into_iter().map(CompletionEntry::new));
    }

    Err(AgentError::MaxRoundsExceeded(max_rounds))
}

/// Append one backend continuation. Returns the last assistant text and the
/// function calls the continuation asked for.
fn append_continuation(
    inner: &SessionInner,
    turn_id: Uuid,
    generated: BackendCompletion,
    entries: &mut Vec<CompletionEntry>,
) -> Result<(String, Vec<FunctionCall>)> {
    let Some(last_assistant) = generated.last_assistant_index() else {
        return Err(AgentError::MissingAssistantResponse);
    };
    let output = generated.messages[last_assistant].content.clone();
    let calls: Vec<FunctionCall> = generated
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .flat_map(|m| m.function_calls.iter().cloned())
        .collect();

    let metrics = generated.metrics;
    let elements = inner.append_for_turn(turn_id, generated.messages)?;
    for (index, element) in elements.into_iter().enumerate() {
        let entry = if index == last_assistant {
            CompletionEntry::with_metrics(element, metrics.clone())
        } else {
            CompletionEntry::new(element)
        };
        entries.push(entry);
    }
    Ok((output, calls))
}

/// Forward backend tokens to the turn's event channel until the turn is
/// cancelled.
fn token_sink(
    stream_id: Uuid,
    start: &TurnStart,
    events: Option<&mpsc::UnboundedSender<TokenEvent>>,
) -> TokenSink {
    let cancel = start.cancel.clone();
    let events = events.cloned();
    Arc::new(move |chunk: TokenChunk| {
        if cancel.is_cancelled() {
            return;
        }
        if let Some(events) = &events {
            let _ = events.send(TokenEvent {
                turn_stream_id: stream_id,
                text: chunk.text,
                token_id: chunk.token_id,
            });
        }
    })
}
