//! Recovery of tool calls the model wrote as plain text.
//!
//! Native tool calling occasionally degrades into text. Three shapes are
//! recognised, always against the set of registered tool names:
//!
//! 1. **call syntax**: `count_leads{"filters": {...}}`, also with `(`…`)` or
//!    `:` between the name and the object.
//! 2. **keyed object**: `{"count_leads": {...}}`, or the OpenAI-ish
//!    `{"name": "count_leads", "arguments": {...}}`.
//! 3. **fenced JSON**: either of the above inside a ```` ```json ```` block.

use serde_json::{Map, Value};

/// A tool call recovered from text. `arguments` is an object, or a bare
/// string when the model wrote `{"tool": "some text"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToolCall {
    pub name: String,
    pub arguments: Value,
}

impl TextToolCall {
    /// Arguments as an object. A raw string payload is wrapped into the
    /// tool's first required parameter (or `input` when it has none).
    pub fn into_arguments(self, first_required: Option<&str>) -> Value {
        match self.arguments {
            Value::Object(_) => self.arguments,
            Value::Null => Value::Object(Map::new()),
            other => {
                let mut map = Map::new();
                map.insert(first_required.unwrap_or("input").to_string(), other);
                Value::Object(map)
            }
        }
    }
}

/// Find the first text tool call to one of `known` tools.
pub fn extract_text_tool_call(text: &str, known: &[&str]) -> Option<TextToolCall> {
    let body = strip_code_fence(text).unwrap_or(text);
    find_call_syntax(body, known).or_else(|| find_keyed_object(body, known))
}

fn find_call_syntax(text: &str, known: &[&str]) -> Option<TextToolCall> {
    let mut best: Option<(usize, TextToolCall)> = None;
    for name in known {
        for (pos, _) in text.match_indices(name) {
            // Whole identifier only.
            let before = text[..pos].chars().next_back();
            if before.is_some_and(|c| c.is_alphanumeric() || c == '_') {
                continue;
            }
            let rest = &text[pos + name.len()..];
            let trimmed = rest.trim_start();
            let trimmed = trimmed
                .strip_prefix('(')
                .or_else(|| trimmed.strip_prefix(':'))
                .unwrap_or(trimmed)
                .trim_start();
            if !trimmed.starts_with('{') {
                continue;
            }
            let start = text.len() - trimmed.len();
            let Some(object) = balanced_object(text, start) else {
                continue;
            };
            let Ok(arguments @ Value::Object(_)) = serde_json::from_str::<Value>(object) else {
                continue;
            };
            if best.as_ref().map_or(true, |(p, _)| pos < *p) {
                best = Some((
                    pos,
                    TextToolCall {
                        name: name.to_string(),
                        arguments,
                    },
                ));
            }
            break;
        }
    }
    best.map(|(_, call)| call)
}

fn find_keyed_object(text: &str, known: &[&str]) -> Option<TextToolCall> {
    for (start, _) in text.match_indices('{') {
        let Some(object) = balanced_object(text, start) else {
            continue;
        };
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(object) else {
            continue;
        };
        if let Some(call) = keyed_call(map, known) {
            return Some(call);
        }
    }
    None
}

fn keyed_call(mut map: Map<String, Value>, known: &[&str]) -> Option<TextToolCall> {
    if let Some(Value::String(name)) = map.get("name").or_else(|| map.get("tool")) {
        if known.contains(&name.as_str()) {
            let name = name.clone();
            let arguments = ["arguments", "parameters", "args"]
                .iter()
                .find_map(|k| map.remove(*k))
                .unwrap_or(Value::Null);
            // Arguments occasionally arrive JSON-encoded.
            let arguments = match arguments {
                Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
                other => other,
            };
            return Some(TextToolCall { name, arguments });
        }
    }

    if map.len() == 1 {
        let (name, arguments) = map.into_iter().next()?;
        if known.contains(&name.as_str()) && (arguments.is_object() || arguments.is_string()) {
            return Some(TextToolCall { name, arguments });
        }
    }
    None
}

/// Contents of the first fenced code block, if any.
pub(crate) fn strip_code_fence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    // Skip the info string (`json`, `JSON`...).
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// The `{…}` object starting at byte `start`, honouring strings and escapes.
pub(crate) fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The first complete JSON object anywhere in `text`.
pub(crate) fn first_balanced_object(text: &str) -> Option<&str> {
    text.match_indices('{')
        .find_map(|(start, _)| balanced_object(text, start))
}
