//! Pluggable execution of a round's function calls.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::dispatcher::FunctionDispatcher;
use super::resolver::ResolvedFunctionCall;
use crate::error::Result;
use crate::types::FunctionReturn;

/// Executes the resolved calls of one round.
///
/// Hosts install their own implementation to sandbox, approve or mock calls.
/// Implementations must return exactly one [`FunctionReturn`] per call, in the
/// order the calls were given, and report cancellation as
/// [`AgentError::Cancelled`](crate::error::AgentError::Cancelled).
#[async_trait]
pub trait FunctionCallExecutor: Send + Sync {
    async fn execute(
        &self,
        calls: Vec<ResolvedFunctionCall>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FunctionReturn>>;
}

#[async_trait]
impl FunctionCallExecutor for FunctionDispatcher {
    async fn execute(
        &self,
        calls: Vec<ResolvedFunctionCall>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FunctionReturn>> {
        self.dispatch(calls, cancel).await
    }
}
