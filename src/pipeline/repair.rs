//! Response repair: recover a JSON array of records from raw LLM output.
//!
//! Even with an exact template in the prompt, models regularly return:
//!
//! - the array wrapped in ` ```json ... ``` ` fences
//! - trailing commas before `]` or `}`
//! - one bare object instead of a one-element array
//! - several objects back to back with no enclosing array
//! - a sentence of preamble before the data
//!
//! All structural decisions go through a small scanner that tracks whether
//! it is inside a string literal (and whether the previous byte was an
//! escape), so braces, brackets and commas inside question text or
//! explanations never change the result.

use crate::error::AttemptError;
use serde_json::Value;

/// Best-effort transformation of raw model output into parsable JSON text.
///
/// The result is not guaranteed to parse; [`parse_records`] reports that as
/// [`AttemptError::Malformed`].
pub fn repair(raw: &str) -> String {
    let content = strip_code_fences(raw);
    let content = strip_trailing_commas(content);
    let trimmed = content.trim();

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return trimmed.to_string();
    }

    let objects = top_level_objects(trimmed);
    if objects.is_empty() {
        return trimmed.to_string();
    }
    format!("[{}]", objects.join(","))
}

/// Repair and parse `raw` into a list of candidate records.
///
/// A single top-level object becomes a one-element list.
pub fn parse_records(raw: &str) -> Result<Vec<Value>, AttemptError> {
    let repaired = repair(raw);
    let value: Value = serde_json::from_str(&repaired)
        .map_err(|e| AttemptError::Malformed(format!("JSON parse error: {e}")))?;
    match value {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(AttemptError::Malformed(format!(
            "expected an array of objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Lexical state shared by the scanning passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    InString,
    Escaped,
}

impl Lex {
    /// Advance over one byte. Returns `true` when the byte is structural
    /// (outside any string literal).
    fn step(&mut self, b: u8) -> bool {
        match *self {
            Lex::Code => {
                if b == b'"' {
                    *self = Lex::InString;
                    false
                } else {
                    true
                }
            }
            Lex::InString => {
                match b {
                    b'\\' => *self = Lex::Escaped,
                    b'"' => *self = Lex::Code,
                    _ => {}
                }
                false
            }
            Lex::Escaped => {
                *self = Lex::InString;
                false
            }
        }
    }
}

/// Remove commas that are followed (after optional whitespace) by `]` or `}`.
fn strip_trailing_commas(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut lex = Lex::Code;
    let mut last = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if !lex.step(b) || b != b',' {
            continue;
        }
        let next = bytes[i + 1..].iter().find(|c| !c.is_ascii_whitespace());
        if matches!(next, Some(b']') | Some(b'}')) {
            out.push_str(&s[last..i]);
            last = i + 1;
        }
    }
    out.push_str(&s[last..]);
    out
}

/// Slice out every object whose braces return to depth zero.
///
/// Objects nested inside an enclosing array are top-level here too, which
/// also recovers an array preceded by prose.
fn top_level_objects(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut lex = Lex::Code;
    let mut depth = 0usize;
    let mut start = None;

    for (i, &b) in s.as_bytes().iter().enumerate() {
        if !lex.step(b) {
            continue;
        }
        match b {
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(st) = start.take() {
                        parts.push(&s[st..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLEAN: &str = r#"[{"question": "Q1", "n": 1}, {"question": "Q2", "n": 2}]"#;

    #[test]
    fn fenced_array_with_trailing_comma_round_trips() {
        let raw = "```json\n[{\"question\": \"Q1\", \"n\": 1,}, {\"question\": \"Q2\", \"n\": 2},]\n```";
        let expected: Value = serde_json::from_str(CLEAN).unwrap();
        let got: Value = serde_json::from_str(&repair(raw)).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn bare_fence_is_stripped() {
        let raw = format!("```\n{CLEAN}\n```");
        assert_eq!(parse_records(&raw).unwrap().len(), 2);
    }

    #[test]
    fn single_object_is_wrapped() {
        let repaired = repair(r#"{"question": "Q"}"#);
        assert_eq!(repaired, r#"[{"question": "Q"}]"#);
    }

    #[test]
    fn concatenated_objects_become_array() {
        let raw = "{\"a\": 1}\n{\"b\": {\"c\": 2}}\n\n{\"d\": 3}";
        let records = parse_records(raw).unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": {"c": 2}}), json!({"d": 3})]);
    }

    #[test]
    fn braces_and_commas_inside_strings_are_ignored() {
        let raw = r#"{"question": "What does f({x,}) return?", "explanation": "a \"quoted\" }, brace"}
{"question": "second"}"#;
        let records = parse_records(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["question"], "What does f({x,}) return?");
        assert_eq!(records[0]["explanation"], "a \"quoted\" }, brace");
    }

    #[test]
    fn trailing_comma_with_whitespace() {
        let raw = "[\n  {\"a\": 1},\n  {\"b\": 2},\n]";
        assert_eq!(parse_records(raw).unwrap().len(), 2);
    }

    #[test]
    fn prose_before_array_is_recovered() {
        let raw = "Here are your questions:\n[{\"a\": 1}, {\"b\": 2}]\nHope this helps!";
        assert_eq!(parse_records(raw).unwrap().len(), 2);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_records("I cannot help with that."),
            Err(AttemptError::Malformed(_))
        ));
        assert!(matches!(
            parse_records("[{\"a\": 1"),
            Err(AttemptError::Malformed(_))
        ));
    }

    #[test]
    fn scalar_json_is_malformed() {
        assert!(matches!(parse_records("42"), Err(AttemptError::Malformed(_))));
    }
}
