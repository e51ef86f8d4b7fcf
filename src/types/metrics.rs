//! Generation metrics reported by the backend.

use serde::{Deserialize, Serialize};

/// Token counts and timings for one backend generation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationMetrics {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_token_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
}

impl GenerationMetrics {
    /// Metrics with only token counts set.
    pub fn from_tokens(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            ..Default::default()
        }
    }

    /// True for entries that carry no generation data (user, system, tool).
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Accumulate another generation into this one.
    ///
    /// Counts and elapsed time add up; time to first token keeps the earliest
    /// round and throughput is recomputed from the merged totals.
    pub fn merge(&mut self, other: &GenerationMetrics) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        if self.time_to_first_token_ms.is_none() {
            self.time_to_first_token_ms = other.time_to_first_token_ms;
        }
        if let Some(ms) = other.total_time_ms {
            *self.total_time_ms.get_or_insert(0.0) += ms;
        }
        self.tokens_per_second = match self.total_time_ms {
            Some(ms) if ms > 0.0 => Some(self.completion_tokens as f64 / (ms / 1000.0)),
            _ => self.tokens_per_second.or(other.tokens_per_second),
        };
    }
}
