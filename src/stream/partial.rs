//! Best-effort parsing of JSON that is still being generated.

use uuid::Uuid;

use super::filter::{FilterStatus, ThinkingFilter};
use crate::types::TokenEvent;

const MAX_CUTBACKS: usize = 32;

/// Parse the first JSON object or array in `text`, closing whatever is still
/// open. Returns `None` when nothing usable has been generated yet.
pub fn parse_partial_json(text: &str) -> Option<serde_json::Value> {
    let start = text.find(['{', '['])?;
    let body = &text[start..];

    if let Some(Ok(value)) = serde_json::Deserializer::from_str(body)
        .into_iter::<serde_json::Value>()
        .next()
    {
        return Some(value);
    }

    let scan = Scan::of(body);
    if let Some(value) = try_close(body) {
        return Some(value);
    }
    scan.cuts
        .iter()
        .rev()
        .take(MAX_CUTBACKS)
        .find_map(|&cut| try_close(&body[..cut]))
}

fn try_close(prefix: &str) -> Option<serde_json::Value> {
    let closed = close(prefix);
    serde_json::from_str(&closed).ok()
}

/// Append whatever is needed to terminate `prefix`.
fn close(prefix: &str) -> String {
    let scan = Scan::of(prefix);
    let mut out = prefix.to_string();
    if scan.in_string {
        if scan.escaped {
            out.pop();
        }
        out.push('"');
    }
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str("null");
    }
    out.extend(scan.closers.iter().rev());
    out
}

struct Scan {
    closers: Vec<char>,
    in_string: bool,
    escaped: bool,
    /// Byte offsets outside strings where the text can be truncated.
    cuts: Vec<usize>,
}

impl Scan {
    fn of(text: &str) -> Self {
        let mut scan = Scan {
            closers: Vec::new(),
            in_string: false,
            escaped: false,
            cuts: Vec::new(),
        };
        for (i, ch) in text.char_indices() {
            if scan.in_string {
                if scan.escaped {
                    scan.escaped = false;
                } else if ch == '\\' {
                    scan.escaped = true;
                } else if ch == '"' {
                    scan.in_string = false;
                }
                continue;
            }
            match ch {
                '"' => scan.in_string = true,
                '{' => {
                    scan.closers.push('}');
                    scan.cuts.push(i + 1);
                }
                '[' => {
                    scan.closers.push(']');
                    scan.cuts.push(i + 1);
                }
                '}' | ']' => {
                    scan.closers.pop();
                }
                ',' => scan.cuts.push(i),
                _ => {}
            }
        }
        scan
    }
}

/// Turns a token stream into partial values.
///
/// Thinking and function-call regions are filtered out first; the state is
/// reset whenever a new backend round starts.
#[derive(Debug, Default)]
pub struct PartialValueStage {
    filter: ThinkingFilter,
    stream_id: Option<Uuid>,
}

impl PartialValueStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &TokenEvent) -> Option<serde_json::Value> {
        if self.stream_id != Some(event.turn_stream_id) {
            self.filter.reset();
            self.stream_id = Some(event.turn_stream_id);
        }
        match self.filter.push(&event.text) {
            FilterStatus::MidTag | FilterStatus::FunctionCall => None,
            FilterStatus::Text | FilterStatus::Thinking => parse_partial_json(self.filter.visible()),
        }
    }
}
