//! Shared test helpers and a scripted mock backend.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use cactus_agent::backend::{BackendCompletion, CompletionRequest, GenerationBackend, TokenChunk, TokenSink};
use cactus_agent::error::AgentError;
use cactus_agent::functions::{AgentFunction, ClosureFunction, FunctionArguments, FunctionParameters};
use cactus_agent::types::{FunctionCall, GenerationMetrics, Message};

/// What the mock does before producing its outcome.
#[derive(Debug, Clone)]
enum Wait {
    None,
    /// Until [`MockBackend::release`] is called.
    Release,
    /// Until the backend is stopped; then the step fails.
    Stop,
    Sleep(Duration),
}

#[derive(Debug, Clone)]
struct Step {
    tokens: Vec<String>,
    wait: Wait,
    /// Emitted after a stop, to check that nothing leaks to the caller.
    tokens_after_stop: Vec<String>,
    outcome: Result<BackendCompletion, String>,
}

/// A backend that plays back queued steps.
pub struct MockBackend {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CompletionRequest>>,
    stops: AtomicUsize,
    resets: AtomicUsize,
    started: Notify,
    release: Notify,
    stop_signal: Mutex<CancellationToken>,
    hold_resets: AtomicBool,
    reset_entered: Notify,
    reset_release: Notify,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
            stop_signal: Mutex::new(CancellationToken::new()),
            hold_resets: AtomicBool::new(false),
            reset_entered: Notify::new(),
            reset_release: Notify::new(),
        }
    }

    fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Queue a plain assistant reply, streamed word by word.
    pub fn queue_reply(&self, text: &str) {
        self.push(Step {
            tokens: words(text),
            wait: Wait::None,
            tokens_after_stop: Vec::new(),
            outcome: Ok(reply(text, Vec::new())),
        });
    }

    /// Queue a reply streamed as exactly `tokens`.
    pub fn queue_tokens(&self, tokens: &[&str]) {
        let text: String = tokens.concat();
        self.push(Step {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            wait: Wait::None,
            tokens_after_stop: Vec::new(),
            outcome: Ok(reply(&text, Vec::new())),
        });
    }

    /// Queue an assistant message that asks for `calls`.
    pub fn queue_calls(&self, text: &str, calls: Vec<FunctionCall>) {
        self.push(Step {
            tokens: words(text),
            wait: Wait::None,
            tokens_after_stop: Vec::new(),
            outcome: Ok(reply(text, calls)),
        });
    }

    /// Queue an arbitrary continuation.
    pub fn queue_completion(&self, completion: BackendCompletion) {
        self.push(Step {
            tokens: Vec::new(),
            wait: Wait::None,
            tokens_after_stop: Vec::new(),
            outcome: Ok(completion),
        });
    }

    pub fn queue_failure(&self, message: &str) {
        self.push(Step {
            tokens: Vec::new(),
            wait: Wait::None,
            tokens_after_stop: Vec::new(),
            outcome: Err(message.to_string()),
        });
    }

    /// Queue a reply that is only produced once [`release`](Self::release) is called.
    pub fn queue_gated_reply(&self, text: &str) {
        self.push(Step {
            tokens: words(text),
            wait: Wait::Release,
            tokens_after_stop: Vec::new(),
            outcome: Ok(reply(text, Vec::new())),
        });
    }

    /// Queue a reply that takes `delay` to produce.
    pub fn queue_slow_reply(&self, text: &str, delay: Duration) {
        self.push(Step {
            tokens: words(text),
            wait: Wait::Sleep(delay),
            tokens_after_stop: Vec::new(),
            outcome: Ok(reply(text, Vec::new())),
        });
    }

    /// Queue a generation that emits `tokens` and then hangs until stopped,
    /// emitting `after_stop` once the stop arrives.
    pub fn queue_hang(&self, tokens: &[&str], after_stop: &[&str]) {
        self.push(Step {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            wait: Wait::Stop,
            tokens_after_stop: after_stop.iter().map(|t| t.to_string()).collect(),
            outcome: Err("generation aborted".to_string()),
        });
    }

    /// Resolve once the backend has emitted the current step's tokens.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Make every later `reset` wait for [`release_reset`](Self::release_reset).
    pub fn hold_resets(&self) {
        self.hold_resets.store(true, Ordering::SeqCst);
    }

    /// Resolve once a held `reset` has been entered.
    pub async fn wait_reset_started(&self) {
        self.reset_entered.notified().await;
    }

    pub fn release_reset(&self) {
        self.reset_release.notify_one();
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn complete(
        &self,
        request: CompletionRequest,
        on_token: TokenSink,
    ) -> Result<BackendCompletion, AgentError> {
        self.requests.lock().unwrap().push(request);
        let step = self.script.lock().unwrap().pop_front().unwrap_or_else(|| Step {
            tokens: words("Mock response"),
            wait: Wait::None,
            tokens_after_stop: Vec::new(),
            outcome: Ok(reply("Mock response", Vec::new())),
        });
        let stop_signal = self.stop_signal.lock().unwrap().clone();

        for (i, token) in step.tokens.iter().enumerate() {
            on_token(TokenChunk::new(token.clone(), i as u32));
        }
        self.started.notify_one();

        match step.wait {
            Wait::None => {}
            Wait::Release => self.release.notified().await,
            Wait::Sleep(delay) => tokio::time::sleep(delay).await,
            Wait::Stop => {
                stop_signal.cancelled().await;
                let offset = step.tokens.len();
                for (i, token) in step.tokens_after_stop.iter().enumerate() {
                    on_token(TokenChunk::new(token.clone(), (offset + i) as u32));
                }
            }
        }

        step.outcome.map_err(AgentError::backend)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let mut signal = self.stop_signal.lock().unwrap();
        signal.cancel();
        *signal = CancellationToken::new();
    }

    async fn reset(&self) -> Result<(), AgentError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.hold_resets.load(Ordering::SeqCst) {
            self.reset_entered.notify_one();
            self.reset_release.notified().await;
        }
        Ok(())
    }
}

fn words(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

fn reply(text: &str, calls: Vec<FunctionCall>) -> BackendCompletion {
    let completion_tokens = text.split_whitespace().count() as u32;
    BackendCompletion::new(vec![Message::assistant(text).with_function_calls(calls)])
        .with_metrics(GenerationMetrics::from_tokens(12, completion_tokens.max(1)))
}

pub fn call(name: &str, arguments: serde_json::Value) -> FunctionCall {
    FunctionCall::new(name, arguments)
}

/// `echo(text)` returns its input.
pub fn echo_function() -> ClosureFunction {
    ClosureFunction::new(
        "echo",
        "Echo the given text",
        FunctionParameters::object().string("text", "Text to echo", true).build(),
        |args: FunctionArguments| async move { Ok(serde_json::json!(args.get_str("text")?)) },
    )
}

/// A function that always fails with `message`.
pub fn failing_function(name: &str, message: &str) -> ClosureFunction {
    let owned_name = name.to_string();
    let message = message.to_string();
    ClosureFunction::new(name, "Always fails", FunctionParameters::empty(), move |_| {
        let err = AgentError::function(owned_name.clone(), message.clone());
        async move { Err(err) }
    })
}

/// A function that sleeps `delay` and then returns `value`.
pub fn delayed_function(name: &str, delay: Duration, value: serde_json::Value) -> ClosureFunction {
    ClosureFunction::new(name, "Sleeps, then answers", FunctionParameters::empty(), move |_| {
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        }
    })
}

pub fn shared(function: impl AgentFunction + 'static) -> Arc<dyn AgentFunction> {
    Arc::new(function)
}
