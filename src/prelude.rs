//! Convenience re-exports for common use.

pub use crate::agent::{AgentSession, TurnPhase, TurnStream};
pub use crate::backend::{BackendCompletion, CompletionRequest, GenerationBackend, TokenChunk, TokenSink};
pub use crate::config::{FailurePolicy, SessionConfig};
pub use crate::error::{AgentError, Result};
pub use crate::functions::{
    AgentFunction, ClosureFunction, FunctionArguments, FunctionCallExecutor, FunctionParameters,
    TypedFunction,
};
pub use crate::prompt::{Json, PromptContent, PromptParts};
pub use crate::transcript::{Transcript, TranscriptElement, TranscriptElementId};
pub use crate::types::{
    Completion, CompletionEntry, FunctionCall, FunctionReturn, GenerationMetrics, GenerationOptions,
    Message, Role, StreamEvent, StreamOptions, TokenEvent,
};
