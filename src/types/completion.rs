//! Result of a completed turn.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::transcript::TranscriptElement;

use super::message::{FunctionReturn, Role};
use super::metrics::GenerationMetrics;

/// One message appended during a turn plus the metrics of the generation
/// that produced it. Metrics are empty for non-assistant entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionEntry {
    pub element: TranscriptElement,
    #[serde(default)]
    pub metrics: GenerationMetrics,
}

impl CompletionEntry {
    pub fn new(element: TranscriptElement) -> Self {
        Self {
            element,
            metrics: GenerationMetrics::default(),
        }
    }

    pub fn with_metrics(element: TranscriptElement, metrics: GenerationMetrics) -> Self {
        Self { element, metrics }
    }

    pub fn role(&self) -> Role {
        self.element.message.role
    }
}

/// Final result of a turn: the answer text and every entry the turn appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub output: String,
    entries: Vec<CompletionEntry>,
}

impl Completion {
    /// Build a completion. A turn that appended nothing is a defect.
    pub fn new(output: impl Into<String>, entries: Vec<CompletionEntry>) -> Result<Self, AgentError> {
        if entries.is_empty() {
            return Err(AgentError::MissingAssistantResponse);
        }
        Ok(Self {
            output: output.into(),
            entries,
        })
    }

    pub fn entries(&self) -> &[CompletionEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CompletionEntry> {
        self.entries
    }

    /// The output with any thinking regions removed.
    pub fn visible_output(&self) -> String {
        crate::stream::strip_thinking(&self.output)
    }

    pub fn assistant_entries(&self) -> impl Iterator<Item = &CompletionEntry> {
        self.entries.iter().filter(|e| e.role() == Role::Assistant)
    }

    /// Function returns fed back to the backend during the turn, in order.
    pub fn function_returns(&self) -> Vec<FunctionReturn> {
        self.entries
            .iter()
            .filter(|e| e.role() == Role::Tool)
            .map(|e| {
                let message = &e.element.message;
                FunctionReturn::new(message.name.clone().unwrap_or_default(), message.content.clone())
            })
            .collect()
    }

    /// Metrics summed over every backend round of the turn.
    pub fn total_metrics(&self) -> GenerationMetrics {
        let mut total = GenerationMetrics::default();
        for entry in &self.entries {
            total.merge(&entry.metrics);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn empty_completion_is_rejected() {
        let err = Completion::new("hi", Vec::new()).unwrap_err();
        assert!(matches!(err, AgentError::MissingAssistantResponse));
    }

    #[test]
    fn total_metrics_sums_assistant_rounds() {
        let entries = vec![
            CompletionEntry::new(TranscriptElement::new(Message::user("q"))),
            CompletionEntry::with_metrics(
                TranscriptElement::new(Message::assistant("")),
                GenerationMetrics::from_tokens(5, 3),
            ),
            CompletionEntry::new(TranscriptElement::new(Message::tool("f", "1"))),
            CompletionEntry::with_metrics(
                TranscriptElement::new(Message::assistant("done")),
                GenerationMetrics::from_tokens(9, 2),
            ),
        ];
        let completion = Completion::new("done", entries).unwrap();

        let total = completion.total_metrics();
        assert_eq!(total.prompt_tokens, 14);
        assert_eq!(total.completion_tokens, 5);
        assert_eq!(completion.assistant_entries().count(), 2);
        assert_eq!(completion.function_returns(), vec![FunctionReturn::new("f", "1")]);
    }

    #[test]
    fn visible_output_strips_thinking() {
        let entries = vec![CompletionEntry::new(TranscriptElement::new(Message::user("q")))];
        let completion = Completion::new("<think>hmm</think>Paris", entries).unwrap();
        assert_eq!(completion.visible_output(), "Paris");
    }
}
