//! Error types for agent sessions.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::types::FunctionCall;

/// Primary error type for all session, transcript and function operations.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Session is already responding to another request")]
    AlreadyResponding,

    #[error("Missing function: {0}")]
    MissingFunction(String),

    #[error("Function name mismatch: expected '{expected}', got '{actual}'")]
    NameMismatch { expected: String, actual: String },

    #[error("Invalid user message: {0}")]
    InvalidUserMessage(String),

    #[error("Invalid system prompt: {0}")]
    InvalidSystemPrompt(String),

    #[error("{count} function call(s) failed: {summary}", count = .failures.len(), summary = summarize(.failures))]
    AggregateFunction { failures: Vec<FunctionFailure> },

    #[error("Turn finished without an assistant response")]
    MissingAssistantResponse,

    #[error("Backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Function execution error: {name}: {message}")]
    FunctionExecution { name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Function loop exceeded {0} rounds")]
    MaxRoundsExceeded(usize),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// One failed call inside an [`AgentError::AggregateFunction`].
#[derive(Debug)]
pub struct FunctionFailure {
    /// Position of the call in the batch the backend emitted.
    pub index: usize,
    pub call: FunctionCall,
    pub error: Box<AgentError>,
}

impl FunctionFailure {
    pub fn new(index: usize, call: FunctionCall, error: AgentError) -> Self {
        Self {
            index,
            call,
            error: Box::new(error),
        }
    }
}

fn summarize(failures: &[FunctionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}: {}", f.index, f.call.name, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AgentError {
    /// Create a backend error from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error wrapping an underlying cause.
    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a function execution error.
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FunctionExecution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Build an aggregate error, ordering failures by their original index.
    pub fn aggregate(mut failures: Vec<FunctionFailure>) -> Self {
        failures.sort_by_key(|f| f.index);
        Self::AggregateFunction { failures }
    }

    /// Failures carried by an aggregate error, empty for every other kind.
    pub fn failures(&self) -> &[FunctionFailure] {
        match self {
            Self::AggregateFunction { failures } => failures,
            _ => &[],
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyResponding => ErrorCategory::Busy,
            Self::MissingFunction(_) | Self::NameMismatch { .. } => ErrorCategory::FunctionRegistry,
            Self::InvalidUserMessage(_)
            | Self::InvalidSystemPrompt(_)
            | Self::InvalidArgument(_)
            | Self::Serialization(_) => ErrorCategory::InvalidInput,
            Self::AggregateFunction { .. } | Self::FunctionExecution { .. } => {
                ErrorCategory::FunctionExecution
            }
            Self::Backend { .. } | Self::MissingAssistantResponse | Self::MaxRoundsExceeded(_) => {
                ErrorCategory::Backend
            }
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Busy | ErrorCategory::Timeout)
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Busy => RecoverySuggestion::RetryLater,
            ErrorCategory::FunctionRegistry => RecoverySuggestion::CheckFunctionRegistry,
            ErrorCategory::InvalidInput => RecoverySuggestion::CheckInput,
            ErrorCategory::FunctionExecution => RecoverySuggestion::CheckFunctionImplementation,
            ErrorCategory::Backend => RecoverySuggestion::CheckBackend,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Cancellation | ErrorCategory::Unknown => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AgentError>;
