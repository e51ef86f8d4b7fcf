//! Generation options passed through to the backend.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Sampling and length controls for one backend call.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub seed: Option<u64>,
    /// Ask the backend to prefer a function call over a direct answer.
    pub force_functions: Option<bool>,
}
