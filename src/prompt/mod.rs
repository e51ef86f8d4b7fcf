//! Conversion of caller-supplied content into message text and images.

use serde::Serialize;

use crate::types::ImageRef;

/// Text and image references ready to become a [`Message`](crate::types::Message).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptParts {
    pub text: String,
    pub images: Vec<ImageRef>,
}

impl PromptParts {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.images.push(image);
        self
    }

    fn validated(self) -> Result<Self, String> {
        if self.text.trim().is_empty() && self.images.is_empty() {
            return Err("prompt content is empty".into());
        }
        Ok(self)
    }
}

/// Anything that can be turned into prompt text plus images.
///
/// Conversion failures are reported as a reason string; the session maps them
/// to `InvalidUserMessage` or `InvalidSystemPrompt` depending on the caller.
pub trait PromptContent {
    fn into_prompt_parts(self) -> Result<PromptParts, String>;
}

impl PromptContent for PromptParts {
    fn into_prompt_parts(self) -> Result<PromptParts, String> {
        self.validated()
    }
}

impl PromptContent for String {
    fn into_prompt_parts(self) -> Result<PromptParts, String> {
        PromptParts::text(self).validated()
    }
}

impl PromptContent for &str {
    fn into_prompt_parts(self) -> Result<PromptParts, String> {
        PromptParts::text(self).validated()
    }
}

impl PromptContent for &String {
    fn into_prompt_parts(self) -> Result<PromptParts, String> {
        PromptParts::text(self.as_str()).validated()
    }
}

/// Structured content sent as its JSON encoding.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> PromptContent for Json<T> {
    fn into_prompt_parts(self) -> Result<PromptParts, String> {
        let text = serde_json::to_string(&self.0).map_err(|e| format!("failed to encode content: {e}"))?;
        PromptParts::text(text).validated()
    }
}
