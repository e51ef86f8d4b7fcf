//! Concurrent execution of resolved function calls.
//!
//! Every call runs on its own task. Results are slotted back by the call's
//! index, so the output follows the input order whatever the completion order.
//! A failing call never cancels its siblings; failures are gathered and raised
//! together once the whole batch has settled. Cancellation is reported as
//! [`AgentError::Cancelled`] and never folded into the aggregate.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::arguments::FunctionArguments;
use super::function::content_from_value;
use super::resolver::ResolvedFunctionCall;
use super::validation::{BasicSchemaValidator, SchemaValidator};
use crate::error::{AgentError, FunctionFailure, Result};
use crate::types::{FunctionCall, FunctionReturn};
use crate::util::with_timeout;

/// Runs batches of resolved calls concurrently.
#[derive(Clone)]
pub struct FunctionDispatcher {
    validator: Arc<dyn SchemaValidator>,
    max_concurrency: Option<usize>,
    call_timeout: Option<Duration>,
}

impl Default for FunctionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionDispatcher {
    /// Unbounded dispatcher using [`BasicSchemaValidator`].
    pub fn new() -> Self {
        Self {
            validator: Arc::new(BasicSchemaValidator),
            max_concurrency: None,
            call_timeout: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Cap how many calls run at once. Zero is treated as one.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    /// Fail any single call that runs longer than `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Run every call and return their results in input order.
    pub async fn dispatch(
        &self,
        calls: Vec<ResolvedFunctionCall>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FunctionReturn>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let total = calls.len();
        let permits = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut join_set: JoinSet<(usize, Result<FunctionReturn>)> = JoinSet::new();
        let mut slots: Vec<Option<Result<FunctionReturn>>> = (0..total).map(|_| None).collect();
        let mut originals: Vec<FunctionCall> = Vec::with_capacity(total);

        tracing::debug!(calls = total, limit = ?self.max_concurrency, "dispatching function calls");

        for (index, resolved) in calls.into_iter().enumerate() {
            originals.push(resolved.call().clone());
            let validator = Arc::clone(&self.validator);
            let permits = permits.clone();
            let timeout = self.call_timeout;

            join_set.spawn(async move {
                let _permit = match permits {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return (index, Err(AgentError::Cancelled)),
                    },
                    None => None,
                };
                let name = resolved.name().to_string();
                let run = run_call(resolved, validator.as_ref());
                let guarded = async {
                    match AssertUnwindSafe(run).catch_unwind().await {
                        Ok(outcome) => outcome,
                        Err(panic) => Err(AgentError::function(
                            name,
                            format!("function panicked: {}", panic_message(panic.as_ref())),
                        )),
                    }
                };
                let outcome = match timeout {
                    Some(limit) => with_timeout(limit, guarded).await,
                    None => guarded.await,
                };
                (index, outcome)
            });
        }

        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    cancelled = true;
                    break;
                }
                next = join_set.join_next() => match next {
                    Some(Ok((index, outcome))) => {
                        if matches!(outcome, Err(AgentError::Cancelled)) {
                            cancelled = true;
                        }
                        slots[index] = Some(outcome);
                    }
                    Some(Err(join_error)) => {
                        tracing::warn!(error = %join_error, "function task ended abnormally");
                    }
                    None => break,
                }
            }
        }

        if cancelled {
            tracing::debug!(calls = total, "function dispatch cancelled");
            return Err(AgentError::Cancelled);
        }

        let mut returns = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (index, (slot, call)) in slots.into_iter().zip(originals).enumerate() {
            match slot {
                Some(Ok(ret)) => returns.push(ret),
                Some(Err(error)) => {
                    tracing::warn!(index, function = %call.name, error = %error, "function call failed");
                    failures.push(FunctionFailure::new(index, call, error));
                }
                None => {
                    let error = AgentError::function(&call.name, "function task ended without a result");
                    failures.push(FunctionFailure::new(index, call, error));
                }
            }
        }

        tracing::debug!(calls = total, failures = failures.len(), "function dispatch settled");

        if failures.is_empty() {
            Ok(returns)
        } else {
            Err(AgentError::aggregate(failures))
        }
    }
}

impl std::fmt::Debug for FunctionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDispatcher")
            .field("max_concurrency", &self.max_concurrency)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

/// Validate, invoke and render one call.
async fn run_call(resolved: ResolvedFunctionCall, validator: &dyn SchemaValidator) -> Result<FunctionReturn> {
    let (function, call) = resolved.into_parts();
    let args = FunctionArguments::new(call.arguments);
    validator
        .validate(args.raw(), &function.parameters().schema)
        .map_err(|reason| AgentError::InvalidArgument(format!("{}: {reason}", call.name)))?;
    let output = function.invoke(args).await?;
    Ok(FunctionReturn::new(call.name, content_from_value(output)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
