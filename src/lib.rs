//! Cactus Agent: multi-turn, function-calling sessions over a single-turn
//! generation backend.
//!
//! A session keeps an ordered [`Transcript`](transcript::Transcript), asks the
//! backend for a continuation, runs any function calls it emits concurrently
//! and feeds the results back until the backend answers directly.
//!
//! # Quick Start
//!
//! ```ignore
//! use cactus_agent::prelude::*;
//!
//! # async fn example(backend: impl GenerationBackend + 'static) -> cactus_agent::error::Result<()> {
//! let weather = TypedFunction::new(
//!     "weather",
//!     "Current weather for a city",
//!     FunctionParameters::object().string("city", "City name", true).build(),
//!     |input: serde_json::Value| async move { Ok(format!("Sunny in {}", input["city"])) },
//! );
//! let session = AgentSession::builder(backend)
//!     .system_prompt("You are a helpful assistant.")
//!     .with_function(weather)
//!     .build()?;
//!
//! let completion = session.respond("What's the weather in Oslo?").await?;
//! println!("{}", completion.visible_output());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod functions;
pub mod prelude;
pub mod prompt;
pub mod stream;
pub mod transcript;
pub mod types;
pub mod util;
