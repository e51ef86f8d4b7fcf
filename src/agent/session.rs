//! The agent session: exclusive turns over a shared transcript.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::state::{ActiveTurn, SessionState, TurnPhase, TurnStart};
use super::stream::TurnStream;
use super::turn;
use crate::backend::GenerationBackend;
use crate::config::SessionConfig;
use crate::error::{AgentError, Result};
use crate::functions::{AgentFunction, FunctionCallExecutor, FunctionDefinition, FunctionRegistry};
use crate::prompt::PromptContent;
use crate::transcript::{Transcript, TranscriptElement};
use crate::types::{Completion, Message, Role, StreamOptions};

pub(crate) struct SessionInner {
    pub backend: Arc<dyn GenerationBackend>,
    pub functions: FunctionRegistry,
    pub executor: Arc<dyn FunctionCallExecutor>,
    pub config: SessionConfig,
    state: Mutex<SessionState>,
    phase: watch::Sender<TurnPhase>,
}

impl SessionInner {
    /// Publish `phase` for `turn_id` if it still owns the session. The phase
    /// only changes under the state lock, so it never disagrees with the
    /// active turn.
    pub fn enter_phase(&self, turn_id: Uuid, phase: TurnPhase) -> bool {
        let mut state = self.state.lock();
        if state.live_turn(turn_id).is_none() {
            return false;
        }
        self.phase.send_replace(phase);
        true
    }

    /// Messages to send to the backend for the next round.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().transcript.messages()
    }

    /// Append messages on behalf of a turn. Fails with `Cancelled` once the
    /// turn has been stopped or replaced.
    pub fn append_for_turn(&self, turn_id: Uuid, messages: Vec<Message>) -> Result<Vec<TranscriptElement>> {
        let mut state = self.state.lock();
        let SessionState { transcript, active } = &mut *state;
        let Some(turn) = active
            .as_mut()
            .filter(|t| t.id == turn_id && !t.cancel.is_cancelled())
        else {
            return Err(AgentError::Cancelled);
        };
        let mut elements = Vec::with_capacity(messages.len());
        for message in messages {
            let element = TranscriptElement::new(message);
            transcript.append(element.clone());
            turn.appended.push(element.id);
            elements.push(element);
        }
        Ok(elements)
    }

    /// Release the session at the end of a turn. A no-op if the turn was
    /// already stopped.
    pub fn finish_turn(&self, turn_id: Uuid, error: Option<&AgentError>) {
        let removed = {
            let mut state = self.state.lock();
            if state.active.as_ref().map(|t| t.id) != Some(turn_id) {
                return;
            }
            let Some(turn) = state.active.take() else {
                return;
            };
            match error {
                Some(_) => {
                    let removed = turn.unwind(&mut state.transcript, self.config.failure_policy);
                    self.phase.send_replace(TurnPhase::Failed);
                    removed
                }
                None => {
                    self.phase.send_replace(TurnPhase::Done);
                    0
                }
            }
        };

        match error {
            None => tracing::info!(turn_id = %turn_id, "turn completed"),
            Some(err) => tracing::warn!(
                turn_id = %turn_id,
                error = %err,
                policy = %self.config.failure_policy,
                removed,
                "turn failed"
            ),
        }
    }

    /// Stop the active turn (or only `turn_id`, if given). The backend is told
    /// to stop exactly once per turn; returns whether a turn was stopped.
    pub fn stop_turn(&self, turn_id: Option<Uuid>) -> bool {
        let stopped = {
            let mut state = self.state.lock();
            self.take_turn(&mut state, turn_id)
        };
        match stopped {
            Some((turn, removed)) => {
                self.halt(turn, removed, "turn stopped");
                true
            }
            None => false,
        }
    }

    /// Remove the matching active turn, unwind what it added and go idle.
    /// Must be called with the state lock held.
    fn take_turn(&self, state: &mut SessionState, turn_id: Option<Uuid>) -> Option<(ActiveTurn, usize)> {
        let matches = state
            .active
            .as_ref()
            .is_some_and(|t| turn_id.map_or(true, |id| id == t.id));
        if !matches {
            return None;
        }
        let turn = state.active.take()?;
        let removed = turn.unwind(&mut state.transcript, self.config.failure_policy);
        self.phase.send_replace(TurnPhase::Idle);
        Some((turn, removed))
    }

    /// Cancel a turn already taken out of the session and stop the backend.
    fn halt(&self, turn: ActiveTurn, removed: usize, reason: &'static str) {
        turn.cancel.cancel();
        self.backend.stop();
        tracing::info!(turn_id = %turn.id, removed, "{reason}");
    }
}

/// A conversational agent over one [`GenerationBackend`].
///
/// Cloning is cheap and every clone drives the same session. At most one
/// turn runs at a time; a second `respond`/`stream` while one is in flight
/// fails with [`AgentError::AlreadyResponding`] without touching the
/// transcript.
///
/// ```ignore
/// let session = AgentSession::builder(backend)
///     .system_prompt("You are a helpful assistant.")
///     .with_function(weather)
///     .build()?;
/// let completion = session.respond("What's the weather in Oslo?").await?;
/// println!("{}", completion.output);
/// ```
#[derive(Clone)]
pub struct AgentSession {
    inner: Arc<SessionInner>,
}

impl AgentSession {
    pub fn builder(backend: impl GenerationBackend + 'static) -> SessionBuilder {
        SessionBuilder::new(Arc::new(backend))
    }

    /// Run a full turn and return its completion.
    ///
    /// Dropping the returned future stops the turn.
    pub async fn respond(&self, content: impl PromptContent) -> Result<Completion> {
        let start = self.begin_turn(content)?;
        let guard = StopOnDrop::new(Arc::clone(&self.inner), start.id);
        let result = turn::run(Arc::clone(&self.inner), start, None).await;
        guard.disarm();
        result
    }

    /// Start a turn whose tokens can be observed while it runs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream(&self, content: impl PromptContent) -> Result<TurnStream> {
        self.stream_with(content, StreamOptions::default())
    }

    pub fn stream_with(&self, content: impl PromptContent, options: StreamOptions) -> Result<TurnStream> {
        let start = self.begin_turn(content)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let turn_id = start.id;
        let cancel = start.cancel.clone();
        let task = tokio::spawn(turn::run(Arc::clone(&self.inner), start, Some(tx)));
        Ok(TurnStream::new(
            Arc::clone(&self.inner),
            turn_id,
            cancel,
            rx,
            task,
            options,
        ))
    }

    /// Stop the active turn, if any.
    pub fn stop(&self) -> bool {
        self.inner.stop_turn(None)
    }

    /// Stop, clear the transcript and reset the backend.
    ///
    /// A turn started while the backend resets keeps its own phase.
    pub async fn reset(&self) -> Result<()> {
        let stopped = {
            let mut state = self.inner.state.lock();
            let stopped = self.inner.take_turn(&mut state, None);
            state.transcript.clear();
            self.inner.phase.send_replace(TurnPhase::Idle);
            stopped
        };
        if let Some((turn, removed)) = stopped {
            self.inner.halt(turn, removed, "turn stopped by reset");
        }
        self.inner.backend.reset().await?;
        tracing::debug!("session reset");
        Ok(())
    }

    /// Replace the transcript, e.g. with one loaded from storage.
    pub fn restore(&self, transcript: Transcript) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.active.is_some() {
            return Err(AgentError::AlreadyResponding);
        }
        state.transcript = transcript;
        Ok(())
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Transcript {
        self.inner.state.lock().transcript.clone()
    }

    pub fn is_responding(&self) -> bool {
        self.inner.state.lock().active.is_some()
    }

    pub fn phase(&self) -> TurnPhase {
        *self.inner.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<TurnPhase> {
        self.inner.phase.subscribe()
    }

    pub fn function_definitions(&self) -> Vec<FunctionDefinition> {
        self.inner.functions.definitions()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Claim the session for a new turn: insert the system prompt on an empty
    /// transcript, then the user message.
    fn begin_turn(&self, content: impl PromptContent) -> Result<TurnStart> {
        let parts = content
            .into_prompt_parts()
            .map_err(AgentError::InvalidUserMessage)?;
        let user = TranscriptElement::new(Message::from_parts(Role::User, parts));

        let start = {
            let mut state = self.inner.state.lock();
            if state.active.is_some() {
                return Err(AgentError::AlreadyResponding);
            }
            let system_id = match &self.inner.config.system_prompt {
                Some(prompt) if state.transcript.is_empty() => {
                    Some(state.transcript.push_message(Message::system(prompt.clone())))
                }
                _ => None,
            };
            state.transcript.append(user.clone());

            let id = Uuid::new_v4();
            let cancel = CancellationToken::new();
            state.active = Some(ActiveTurn {
                id,
                cancel: cancel.clone(),
                system_id,
                user_id: user.id,
                appended: Vec::new(),
            });
            self.inner.phase.send_replace(TurnPhase::AwaitingModel);
            TurnStart { id, cancel, user }
        };

        tracing::debug!(turn_id = %start.id, "turn started");
        Ok(start)
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("functions", &self.inner.functions)
            .field("config", &self.inner.config)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Stops a turn if dropped before [`disarm`](Self::disarm).
pub(crate) struct StopOnDrop {
    inner: Option<Arc<SessionInner>>,
    turn_id: Uuid,
}

impl StopOnDrop {
    pub fn new(inner: Arc<SessionInner>, turn_id: Uuid) -> Self {
        Self {
            inner: Some(inner),
            turn_id,
        }
    }

    pub fn disarm(mut self) {
        self.inner = None;
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.stop_turn(Some(self.turn_id));
        }
    }
}

/// Builder for [`AgentSession`].
pub struct SessionBuilder {
    backend: Arc<dyn GenerationBackend>,
    config: SessionConfig,
    functions: Vec<Arc<dyn AgentFunction>>,
    executor: Option<Arc<dyn FunctionCallExecutor>>,
    transcript: Option<Transcript>,
}

impl SessionBuilder {
    fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            config: SessionConfig::default(),
            functions: Vec::new(),
            executor: None,
            transcript: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_function(mut self, function: impl AgentFunction + 'static) -> Self {
        self.functions.push(Arc::new(function));
        self
    }

    pub fn with_functions(mut self, functions: impl IntoIterator<Item = Arc<dyn AgentFunction>>) -> Self {
        self.functions.extend(functions);
        self
    }

    /// Route function calls through `executor` instead of the built-in
    /// dispatcher.
    pub fn executor(mut self, executor: impl FunctionCallExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Start from an existing transcript.
    pub fn transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn build(self) -> Result<AgentSession> {
        self.config.validate()?;

        let mut functions = FunctionRegistry::new();
        for function in self.functions {
            functions.register(function)?;
        }
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(self.config.dispatcher()),
        };
        let (phase, _) = watch::channel(TurnPhase::Idle);

        let state = SessionState {
            transcript: self.transcript.unwrap_or_default(),
            active: None,
        };

        Ok(AgentSession {
            inner: Arc::new(SessionInner {
                backend: self.backend,
                functions,
                executor,
                config: self.config,
                state: Mutex::new(state),
                phase,
            }),
        })
    }
}
