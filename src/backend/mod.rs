//! The generation backend a session drives.
//!
//! A backend turns a message list into its canonical continuation: at least one
//! assistant message, possibly carrying function calls. Tokens are pushed to the
//! supplied [`TokenSink`] as they are produced.

pub mod blocking;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::functions::FunctionDefinition;
use crate::types::{GenerationMetrics, GenerationOptions, Message, Role};

pub use blocking::{BlockingBackend, BlockingGenerate};

/// One generated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChunk {
    pub text: String,
    pub token_id: u32,
}

impl TokenChunk {
    pub fn new(text: impl Into<String>, token_id: u32) -> Self {
        Self {
            text: text.into(),
            token_id,
        }
    }
}

/// Receives tokens synchronously, in generation order. Must not block.
pub type TokenSink = Arc<dyn Fn(TokenChunk) + Send + Sync>;

/// Everything the backend needs for one round.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
    pub functions: Vec<FunctionDefinition>,
}

/// What one round produced.
#[derive(Debug, Clone, Default)]
pub struct BackendCompletion {
    pub metrics: GenerationMetrics,
    /// Messages the backend appended, in order.
    pub messages: Vec<Message>,
}

impl BackendCompletion {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            metrics: GenerationMetrics::default(),
            messages,
        }
    }

    pub fn with_metrics(mut self, metrics: GenerationMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Index of the last assistant message, if any.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == Role::Assistant)
    }
}

/// Single-turn generation primitive.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a continuation of `request.messages`.
    async fn complete(&self, request: CompletionRequest, on_token: TokenSink) -> Result<BackendCompletion>;

    /// Abort the in-flight generation, if any. Must return promptly.
    fn stop(&self);

    /// Drop any cached context held for the conversation.
    async fn reset(&self) -> Result<()>;
}

#[async_trait]
impl<B: GenerationBackend + ?Sized> GenerationBackend for Arc<B> {
    async fn complete(&self, request: CompletionRequest, on_token: TokenSink) -> Result<BackendCompletion> {
        (**self).complete(request, on_token).await
    }

    fn stop(&self) {
        (**self).stop()
    }

    async fn reset(&self) -> Result<()> {
        (**self).reset().await
    }
}
