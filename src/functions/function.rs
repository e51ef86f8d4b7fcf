//! Callable functions exposed to the backend.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::arguments::FunctionArguments;
use super::parameters::{FunctionDefinition, FunctionParameters};
use crate::error::AgentError;

/// Type-erased function capability.
///
/// The resolver and dispatcher only ever see `Arc<dyn AgentFunction>`; typed
/// input/output handling lives behind [`TypedFunction`].
#[async_trait]
pub trait AgentFunction: Send + Sync {
    /// Name the backend uses to call this function.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments.
    fn parameters(&self) -> &FunctionParameters;

    /// Invoke with already validated arguments.
    async fn invoke(&self, args: FunctionArguments) -> Result<serde_json::Value, AgentError>;

    /// Definition sent to the backend.
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type BoxedOutput = Pin<Box<dyn Future<Output = Result<serde_json::Value, AgentError>> + Send>>;

type RawHandler = dyn Fn(FunctionArguments) -> BoxedOutput + Send + Sync;

/// Function backed by a closure over raw [`FunctionArguments`].
pub struct ClosureFunction {
    name: String,
    description: String,
    parameters: FunctionParameters,
    handler: Arc<RawHandler>,
}

impl ClosureFunction {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: FunctionParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(FunctionArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, AgentError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

#[async_trait]
impl AgentFunction for ClosureFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &FunctionParameters {
        &self.parameters
    }

    async fn invoke(&self, args: FunctionArguments) -> Result<serde_json::Value, AgentError> {
        (self.handler)(args).await
    }
}

impl std::fmt::Debug for ClosureFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureFunction")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Function with a typed input and output.
///
/// Arguments are decoded into `I` with serde before the handler runs and the
/// handler's `O` is encoded back to JSON.
pub struct TypedFunction<I, O> {
    name: String,
    description: String,
    parameters: FunctionParameters,
    handler: Arc<dyn Fn(I) -> Pin<Box<dyn Future<Output = Result<O, AgentError>> + Send>> + Send + Sync>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> TypedFunction<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: FunctionParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, AgentError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |input| Box::pin(handler(input))),
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O> AgentFunction for TypedFunction<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &FunctionParameters {
        &self.parameters
    }

    async fn invoke(&self, args: FunctionArguments) -> Result<serde_json::Value, AgentError> {
        let input: I = args.decode()?;
        let output = (self.handler)(input).await?;
        Ok(serde_json::to_value(output)?)
    }
}

impl<I, O> std::fmt::Debug for TypedFunction<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedFunction")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Render a function's output as the text content of a tool message.
///
/// Strings pass through unquoted; everything else is JSON-encoded.
pub fn content_from_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
