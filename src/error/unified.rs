//! Error classification and recovery hints.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Another turn is in flight on the same session.
    Busy,
    FunctionRegistry,
    InvalidInput,
    FunctionExecution,
    Backend,
    Timeout,
    Cancellation,
    Configuration,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoverySuggestion {
    RetryLater,
    CheckFunctionRegistry,
    CheckInput,
    CheckFunctionImplementation,
    CheckBackend,
    IncreaseTimeout,
    CheckConfiguration,
    None,
}
