//! Incremental removal of thinking and function-call regions from token text.

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const CALL_OPEN: &str = "<tool_call>";
const CALL_CLOSE: &str = "</tool_call>";

/// Where the filter currently is in the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    /// Plain visible text.
    Text,
    /// Inside `<think>...</think>`.
    Thinking,
    /// Inside `<tool_call>...</tool_call>`.
    FunctionCall,
    /// The tail of the input could be the start of a tag and is held back.
    MidTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Text,
    Thinking,
    FunctionCall,
}

impl Region {
    fn closing_tag(self) -> Option<&'static str> {
        match self {
            Region::Text => None,
            Region::Thinking => Some(THINK_CLOSE),
            Region::FunctionCall => Some(CALL_CLOSE),
        }
    }
}

/// Feeds on token text and accumulates only the visible part.
#[derive(Debug, Clone)]
pub struct ThinkingFilter {
    region: Region,
    held: String,
    visible: String,
}

impl Default for ThinkingFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkingFilter {
    pub fn new() -> Self {
        Self {
            region: Region::Text,
            held: String::new(),
            visible: String::new(),
        }
    }

    /// Visible text accumulated so far.
    pub fn visible(&self) -> &str {
        &self.visible
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Consume the next piece of generated text.
    pub fn push(&mut self, text: &str) -> FilterStatus {
        let mut buf = std::mem::take(&mut self.held);
        buf.push_str(text);
        let mut rest = buf.as_str();

        loop {
            match self.region.closing_tag() {
                None => match find_opening(rest) {
                    Some((at, tag, region)) => {
                        self.visible.push_str(&rest[..at]);
                        rest = &rest[at + tag.len()..];
                        self.region = region;
                    }
                    None => {
                        let keep = held_suffix(rest, &[THINK_OPEN, CALL_OPEN]);
                        let split = rest.len() - keep;
                        self.visible.push_str(&rest[..split]);
                        self.held = rest[split..].to_string();
                        break;
                    }
                },
                Some(close) => match rest.find(close) {
                    Some(at) => {
                        rest = &rest[at + close.len()..];
                        self.region = Region::Text;
                    }
                    None => {
                        let keep = held_suffix(rest, &[close]);
                        self.held = rest[rest.len() - keep..].to_string();
                        break;
                    }
                },
            }
        }

        self.status()
    }

    pub fn status(&self) -> FilterStatus {
        if !self.held.is_empty() {
            return FilterStatus::MidTag;
        }
        match self.region {
            Region::Text => FilterStatus::Text,
            Region::Thinking => FilterStatus::Thinking,
            Region::FunctionCall => FilterStatus::FunctionCall,
        }
    }
}

fn find_opening(text: &str) -> Option<(usize, &'static str, Region)> {
    [(THINK_OPEN, Region::Thinking), (CALL_OPEN, Region::FunctionCall)]
        .into_iter()
        .filter_map(|(tag, region)| text.find(tag).map(|at| (at, tag, region)))
        .min_by_key(|(at, _, _)| *at)
}

/// Byte length of the tail of `text` that is a proper prefix of one of `tags`.
fn held_suffix(text: &str, tags: &[&str]) -> usize {
    let Some(at) = text.rfind('<') else {
        return 0;
    };
    let tail = &text[at..];
    if tags.iter().any(|tag| tail.len() < tag.len() && tag.starts_with(tail)) {
        tail.len()
    } else {
        0
    }
}
