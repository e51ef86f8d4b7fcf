//! Registry of session functions and call resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::function::AgentFunction;
use super::parameters::FunctionDefinition;
use crate::error::{AgentError, Result};
use crate::types::FunctionCall;

/// A backend call paired with the function that will serve it.
#[derive(Clone)]
pub struct ResolvedFunctionCall {
    function: Arc<dyn AgentFunction>,
    call: FunctionCall,
}

impl ResolvedFunctionCall {
    /// Pair a call with a function; the names must agree.
    pub fn new(function: Arc<dyn AgentFunction>, call: FunctionCall) -> Result<Self> {
        if function.name() != call.name {
            return Err(AgentError::NameMismatch {
                expected: function.name().to_string(),
                actual: call.name,
            });
        }
        Ok(Self { function, call })
    }

    pub fn function(&self) -> &Arc<dyn AgentFunction> {
        &self.function
    }

    pub fn call(&self) -> &FunctionCall {
        &self.call
    }

    pub fn name(&self) -> &str {
        &self.call.name
    }

    pub fn into_parts(self) -> (Arc<dyn AgentFunction>, FunctionCall) {
        (self.function, self.call)
    }
}

impl std::fmt::Debug for ResolvedFunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFunctionCall")
            .field("name", &self.call.name)
            .field("arguments", &self.call.arguments)
            .finish()
    }
}

/// Functions registered on a session, in registration order.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: Vec<Arc<dyn AgentFunction>>,
    by_name: HashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Names are unique within a registry.
    pub fn register(&mut self, function: Arc<dyn AgentFunction>) -> Result<()> {
        let name = function.name().to_string();
        if name.trim().is_empty() {
            return Err(AgentError::Configuration(
                "function name must not be empty".into(),
            ));
        }
        if self.by_name.contains_key(&name) {
            return Err(AgentError::Configuration(format!(
                "function '{name}' is already registered"
            )));
        }
        self.by_name.insert(name, self.functions.len());
        self.functions.push(function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentFunction>> {
        self.by_name.get(name).map(|&i| &self.functions[i])
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name())
    }

    /// Definitions of every registered function, in registration order.
    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.functions.iter().map(|f| f.definition()).collect()
    }

    /// Match one backend call to its function.
    pub fn resolve(&self, call: FunctionCall) -> Result<ResolvedFunctionCall> {
        match self.get(&call.name) {
            Some(function) => ResolvedFunctionCall::new(Arc::clone(function), call),
            None => Err(AgentError::MissingFunction(call.name)),
        }
    }

    /// Resolve a batch, failing on the first unknown name.
    pub fn resolve_all(&self, calls: Vec<FunctionCall>) -> Result<Vec<ResolvedFunctionCall>> {
        calls.into_iter().map(|call| self.resolve(call)).collect()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
