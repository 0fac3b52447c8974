//! Recovery layers that turn free-form model output into a JSON candidate.
//!
//! Each layer is a pure `text -> Option<Value>` function. Layers only decide
//! whether *some* JSON can be pulled out of the text; whether that JSON is a
//! usable plan is decided by validation afterwards.

use serde_json::Value;

const FENCE: &str = "```";

/// Treat the whole response as one JSON document.
pub fn direct_parse(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Pull JSON out of a fenced code block, or failing that out of the widest
/// `{ ... }` span in the text, or the first balanced object.
pub fn extract_embedded(text: &str) -> Option<Value> {
    fenced_block(text)
        .and_then(|block| serde_json::from_str(block).ok())
        .or_else(|| brace_span(text).and_then(|span| serde_json::from_str(span).ok()))
        .or_else(|| balanced_span(text).and_then(|span| serde_json::from_str(span).ok()))
}

/// Close a document that was cut off mid-generation and parse the result.
pub fn repair_truncated(text: &str) -> Option<Value> {
    repair_truncated_json(text).and_then(|repaired| serde_json::from_str(&repaired).ok())
}

/// Interior of the first fenced code block, with an optional language tag.
pub fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_fence = &text[open + FENCE.len()..];
    let tag_len = after_fence
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after_fence.len());
    let body = &after_fence[tag_len..];
    let close = body.find(FENCE)?;
    let block = body[..close].trim();

    if block.is_empty() {
        None
    } else {
        Some(block)
    }
}

/// From the first `{` through the last `}`.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// From the first `{` through the brace that closes it.
///
/// Covers a complete document followed by prose or another object that
/// contains braces of its own.
pub fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text[start..].bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Rebuild a truncated JSON document.
///
/// The text is trimmed to start at the first `{`. An unterminated string at
/// the end is dropped, then dangling tails (commas, keys without values,
/// half-written literals) are peeled off until the document ends on a
/// complete value. An object left open directly inside an array is dropped
/// whole, since its remaining fields never arrived. Finally the still-open
/// containers are closed in exact reverse order of opening.
///
/// Returns `None` when there is nothing to close or the brackets are
/// mismatched beyond repair.
pub fn repair_truncated_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut body = text[start..].trim_end().to_string();

    let state = scan(&body)?;
    if let Some(open) = state.open_string_start {
        body.truncate(open);
    }

    while trim_dangling_tail(&mut body) {}

    let mut state = scan(&body)?;
    if let [.., (b'[', _), (b'{', object_start)] = state.stack.as_slice() {
        body.truncate(*object_start);
        while trim_dangling_tail(&mut body) {}
        state = scan(&body)?;
    }

    if state.open_string_start.is_some() || state.stack.is_empty() {
        return None;
    }

    for (opener, _) in state.stack.iter().rev() {
        body.push(if *opener == b'{' { '}' } else { ']' });
    }

    Some(body)
}

#[derive(Debug, Default)]
struct ScanState {
    /// Unclosed `{` / `[` in opening order, with their byte offsets.
    stack: Vec<(u8, usize)>,
    /// Byte offset of the opening quote of an unterminated string.
    open_string_start: Option<usize>,
    /// Byte offset of the opening quote of the last complete string.
    last_string_start: Option<usize>,
}

// Structural characters are ASCII, so walking bytes is safe for UTF-8 input.
fn scan(text: &str) -> Option<ScanState> {
    let mut state = ScanState::default();
    let mut in_string = false;
    let mut escaped = false;
    let mut string_start = 0;

    for (index, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
                state.last_string_start = Some(string_start);
            }
            continue;
        }

        match byte {
            b'"' => {
                in_string = true;
                string_start = index;
            }
            b'{' | b'[' => state.stack.push((byte, index)),
            b'}' => {
                if !matches!(state.stack.pop(), Some((b'{', _))) {
                    return None;
                }
            }
            b']' => {
                if !matches!(state.stack.pop(), Some((b'[', _))) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if in_string {
        state.open_string_start = Some(string_start);
    }

    Some(state)
}

/// Peel one dangling element off the end of `body`. Returns whether anything
/// was removed.
fn trim_dangling_tail(body: &mut String) -> bool {
    let trimmed_len = body.trim_end().len();
    if trimmed_len != body.len() {
        body.truncate(trimmed_len);
        return true;
    }

    let Some(last) = body.chars().last() else {
        return false;
    };

    match last {
        ',' | ':' => {
            body.pop();
            if last == ':' {
                drop_trailing_string(body);
            }
            true
        }
        '"' => drop_dangling_key(body),
        c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+') => {
            drop_partial_literal(body)
        }
        _ => false,
    }
}

// A string directly inside an object that is not preceded by `:` is a key
// whose value never arrived.
fn drop_dangling_key(body: &mut String) -> bool {
    let Some(state) = scan(body) else {
        return false;
    };
    let Some(string_start) = state.last_string_start else {
        return false;
    };
    if !matches!(state.stack.last(), Some((b'{', _))) {
        return false;
    }

    let preceding = body[..string_start].trim_end().chars().last();
    if matches!(preceding, Some(',') | Some('{')) {
        body.truncate(string_start);
        return true;
    }
    false
}

fn drop_trailing_string(body: &mut String) {
    let trimmed_len = body.trim_end().len();
    body.truncate(trimmed_len);
    if !body.ends_with('"') {
        return;
    }
    if let Some(start) = scan(body).and_then(|state| state.last_string_start) {
        body.truncate(start);
    }
}

fn drop_partial_literal(body: &mut String) -> bool {
    let token_start = body
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
        .last()
        .map(|(index, _)| index)
        .unwrap_or(body.len());

    let token = &body[token_start..];
    if serde_json::from_str::<Value>(token).is_ok() {
        return false;
    }

    body.truncate(token_start);
    true
}
