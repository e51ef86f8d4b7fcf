//! Token-level text processing for streamed output.

pub mod filter;
pub mod partial;

use std::sync::OnceLock;

use regex::Regex;

pub use filter::{FilterStatus, ThinkingFilter};
pub use partial::{parse_partial_json, PartialValueStage};

fn thinking_block() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<think>.*?(?:</think>|$)").ok())
        .as_ref()
}

/// Remove `<think>` regions (including an unterminated trailing one).
pub fn strip_thinking(text: &str) -> String {
    match thinking_block() {
        Some(pattern) => pattern.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_closed_and_open_blocks() {
        assert_eq!(strip_thinking("<think>a\nb</think>\n\nAnswer"), "Answer");
        assert_eq!(strip_thinking("Answer <think>still going"), "Answer");
        assert_eq!(strip_thinking("no thinking"), "no thinking");
    }
}
