//! Core value types shared across the crate.

pub mod completion;
pub mod generation;
pub mod message;
pub mod metrics;
pub mod stream;

pub use completion::*;
pub use generation::*;
pub use message::*;
pub use metrics::*;
pub use stream::*;
