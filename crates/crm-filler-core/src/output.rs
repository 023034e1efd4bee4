//! Reading structured data out of raw model output.
//!
//! Models are asked for a bare JSON object but regularly wrap it in prose or
//! code fences, leave trailing commas, or get cut off mid-object. Parsing
//! therefore runs in three steps:
//!
//! 1. Strict parse of the whole text.
//! 2. Slice from the first `{` to the last `}` and run [`repair_json`] on it.
//! 3. Give up and return an empty object.
//!
//! Whether the parsed value is usable is a separate, pure check
//! ([`is_valid_extraction`]) so retry logic can be driven by it.

use serde_json::{Map, Value};

use crate::models::ExtractionResult;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Parse raw model text into JSON, falling back to an empty object.
pub fn parse_model_output(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return empty_object();
    }

    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }

    let candidate = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        // Truncated output: no closing brace after the opening one.
        (Some(start), _) => &raw[start..],
        _ => raw,
    };

    serde_json::from_str(&repair_json(candidate)).unwrap_or_else(|_| empty_object())
}

/// A parsed response is usable when it is an object with an `actions` key.
///
/// The lists themselves are read leniently by [`into_extraction`], so one odd
/// action or a `null` list never costs a retry.
pub fn is_valid_extraction(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("actions"))
}

/// Convert a value accepted by [`is_valid_extraction`] into its typed form.
pub fn into_extraction(value: Value) -> Option<ExtractionResult> {
    if !is_valid_extraction(&value) {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Best-effort repair of almost-JSON.
///
/// Handles trailing commas, Python literals (`None`, `True`, `False`) outside
/// strings, raw control characters inside strings, stray closing brackets,
/// and truncation (unterminated strings, dangling keys, unclosed brackets).
pub fn repair_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            if escape {
                out.push(c);
                escape = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escape = true;
                }
                '"' => {
                    out.push(c);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if closers.last() == Some(&c) {
                    strip_trailing_comma(&mut out);
                    closers.pop();
                    out.push(c);
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    other => other,
                });
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escape {
            out.pop();
        }
        out.push('"');
    }

    strip_trailing_comma(&mut out);
    if !closers.is_empty() {
        close_dangling_key(&mut out, closers.last() == Some(&'}'));
    }
    while let Some(closer) = closers.pop() {
        strip_trailing_comma(&mut out);
        out.push(closer);
    }

    out
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
}

/// Inside a truncated object, `"key"` or `"key":` with no value becomes
/// `"key": null` so the object can be closed.
fn close_dangling_key(out: &mut String, in_object: bool) {
    if !in_object {
        return;
    }
    if out.ends_with(':') {
        out.push_str(" null");
        return;
    }
    if !out.ends_with('"') {
        return;
    }
    // A string directly after `{` or `,` is a key, not a value.
    let Some(open) = last_string_start(out) else {
        return;
    };
    let before = out[..open].trim_end();
    if before.ends_with('{') || before.ends_with(',') {
        out.push_str(": null");
    }
}

/// Byte offset of the opening quote of the string that ends `out`.
fn last_string_start(out: &str) -> Option<usize> {
    let body = &out[..out.len() - 1];
    let mut idx = body.len();
    while let Some(pos) = body[..idx].rfind('"') {
        let backslashes = body[..pos].chars().rev().take_while(|&c| c == '\\').count();
        if backslashes % 2 == 0 {
            return Some(pos);
        }
        idx = pos;
    }
    None
}
