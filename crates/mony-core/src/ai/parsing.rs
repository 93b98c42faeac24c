//! JSON recovery for model responses
//!
//! Vision models wrap their answer in prose or code fences and occasionally
//! emit almost-JSON. These helpers locate the object and make one repair
//! attempt before giving up.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Raw output kept in logs is cut to this many characters
const MAX_LOGGED_OUTPUT: usize = 500;

/// Decode the JSON object embedded in a model response
pub fn parse_model_json(response: &str) -> Result<Value> {
    let unfenced = strip_code_fences(response);

    let candidate = match find_json_object(&unfenced) {
        Some(candidate) => candidate,
        None => return Err(parse_failure("no JSON object found in model output", response)),
    };

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first) => {
            debug!(error = %first, "Model output is not valid JSON, attempting repair");
            let repaired = repair_json(candidate);
            serde_json::from_str(&repaired).map_err(|e| {
                parse_failure(&format!("invalid JSON after repair: {}", e), response)
            })
        }
    }
}

fn parse_failure(message: &str, raw: &str) -> Error {
    let raw = truncate(raw, MAX_LOGGED_OUTPUT);
    error!(raw = %raw, "{}", message);
    Error::ExtractionParse {
        message: message.to_string(),
        raw,
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Remove markdown code fence lines (```` ``` ```` or ```` ```json ````)
pub fn strip_code_fences(text: &str) -> String {
    let fence = Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*$").expect("valid regex");
    fence.replace_all(text, "").into_owned()
}

/// Slice from the first `{` to the brace that closes it.
///
/// Braces inside string literals do not count.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Fix the mistakes models most often make in JSON.
///
/// Single-quoted strings become double-quoted, raw control characters inside
/// strings are escaped, and trailing commas before `}` or `]` are dropped.
pub fn repair_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in input.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    // \' is not a valid JSON escape
                    if c == '\'' {
                        out.pop();
                    }
                    out.push(c);
                } else if c == '\\' {
                    escaped = true;
                    out.push(c);
                } else if c == q {
                    quote = None;
                    out.push('"');
                } else if c == '"' {
                    out.push_str("\\\"");
                } else if c == '\n' {
                    out.push_str("\\n");
                } else if c == '\r' {
                    out.push_str("\\r");
                } else if c == '\t' {
                    out.push_str("\\t");
                } else {
                    out.push(c);
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                    out.push('"');
                } else {
                    out.push(c);
                }
            }
        }
    }

    let trailing_comma = Regex::new(r#",(\s*[}\]])"#).expect("valid regex");
    remove_outside_strings(&out, &trailing_comma)
}

/// Apply the trailing-comma regex only to text outside string literals
fn remove_outside_strings(json: &str, re: &Regex) -> String {
    let mut result = String::with_capacity(json.len());
    let mut segment_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in json.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                result.push_str(&json[segment_start..=i]);
                segment_start = i + 1;
            }
        } else if c == '"' {
            result.push_str(&re.replace_all(&json[segment_start..i], "$1"));
            segment_start = i;
            in_string = true;
        }
    }

    let tail = &json[segment_start..];
    if in_string {
        result.push_str(tail);
    } else {
        result.push_str(&re.replace_all(tail, "$1"));
    }
    result
}
