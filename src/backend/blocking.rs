//! Adapter for synchronous generators.

use std::sync::Arc;

use async_trait::async_trait;

use super::{BackendCompletion, CompletionRequest, GenerationBackend, TokenChunk, TokenSink};
use crate::error::{AgentError, Result};

/// A generator whose `generate` call blocks the calling thread.
pub trait BlockingGenerate: Send + Sync + 'static {
    fn generate(&self, request: &CompletionRequest, on_token: &dyn Fn(TokenChunk)) -> Result<BackendCompletion>;

    /// Called from async context while `generate` may be running on another
    /// thread; implementations flip a flag the generation loop polls.
    fn stop(&self);

    fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Runs a [`BlockingGenerate`] on the blocking thread pool.
pub struct BlockingBackend<G> {
    inner: Arc<G>,
}

impl<G: BlockingGenerate> BlockingBackend<G> {
    pub fn new(generator: G) -> Self {
        Self {
            inner: Arc::new(generator),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: BlockingGenerate> GenerationBackend for BlockingBackend<G> {
    async fn complete(&self, request: CompletionRequest, on_token: TokenSink) -> Result<BackendCompletion> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.generate(&request, on_token.as_ref()))
            .await
            .map_err(|e| AgentError::backend_with_source("blocking generation task failed", e))?
    }

    fn stop(&self) {
        self.inner.stop();
    }

    async fn reset(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.reset())
            .await
            .map_err(|e| AgentError::backend_with_source("blocking reset task failed", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerationOptions, Message};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Spelling {
        stopped: AtomicBool,
        resets: AtomicUsize,
    }

    impl BlockingGenerate for Spelling {
        fn generate(&self, request: &CompletionRequest, on_token: &dyn Fn(TokenChunk)) -> Result<BackendCompletion> {
            let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let mut out = String::new();
            for (i, ch) in prompt.chars().enumerate() {
                if self.stopped.load(Ordering::SeqCst) {
                    break;
                }
                on_token(TokenChunk::new(ch.to_string(), i as u32));
                out.push(ch);
            }
            Ok(BackendCompletion::new(vec![Message::assistant(out)]))
        }

        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn reset(&self) -> Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn runs_generator_off_thread_and_forwards_tokens() {
        let backend = BlockingBackend::new(Spelling::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: TokenSink = Arc::new(move |chunk: TokenChunk| sink_seen.lock().unwrap().push(chunk.text));

        let request = CompletionRequest {
            messages: vec![Message::user("abc")],
            options: GenerationOptions::default(),
            functions: Vec::new(),
        };
        let completion = backend.complete(request, sink).await.unwrap();

        assert_eq!(completion.messages[0].content, "abc");
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn stop_and_reset_reach_generator() {
        let backend = BlockingBackend::new(Spelling::default());
        backend.stop();
        backend.reset().await.unwrap();
        assert!(backend.inner().stopped.load(Ordering::SeqCst));
        assert_eq!(backend.inner().resets.load(Ordering::SeqCst), 1);
    }
}
