//! Functions the backend may call, and how calls are resolved and run.

pub mod arguments;
pub mod dispatcher;
pub mod executor;
pub mod function;
pub mod parameters;
pub mod resolver;
pub mod validation;

pub use arguments::FunctionArguments;
pub use dispatcher::FunctionDispatcher;
pub use executor::FunctionCallExecutor;
pub use function::{content_from_value, AgentFunction, ClosureFunction, TypedFunction};
pub use parameters::{FunctionDefinition, FunctionParameters, ParameterBuilder};
pub use resolver::{FunctionRegistry, ResolvedFunctionCall};
pub use validation::{BasicSchemaValidator, NoopValidator, SchemaValidator};
