//! Agent sessions: multi-turn conversations with function execution.

pub mod session;
pub mod state;
pub mod stream;
mod turn;

pub use session::{AgentSession, SessionBuilder};
pub use state::TurnPhase;
pub use stream::TurnStream;
