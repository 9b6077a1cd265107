//! Tolerant parsing for partial JSON streaming buffers.
//!
//! While a prompt output streams, the post-processor wants to peek at the
//! JSON document produced so far. The buffer is usually a prefix of a valid
//! document: strings may be unterminated and braces/brackets unbalanced.
//! [`parse_partial`] closes what can be closed and parses the result;
//! anything beyond repair simply yields `None` and the caller falls back to
//! the last committed state.

use serde_json::Value;

/// Parse `text` as JSON, closing unterminated strings and unbalanced
/// containers first. Returns `None` when the buffer is not a usable prefix.
pub fn parse_partial(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    serde_json::from_str(&close_partial(trimmed)).ok()
}

/// Append the closers a JSON prefix is missing.
///
/// Scans with string/escape awareness, tracking the open-container stack so
/// closers are appended in the right order. Dangling separators (a trailing
/// `,` or `:`) are patched so the completed text stays parseable.
pub fn close_partial(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in text.chars() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut repaired = text.to_string();
    if escape {
        // A lone trailing backslash cannot start a valid escape.
        repaired.pop();
    }
    if in_string {
        repaired.push('"');
    }

    loop {
        repaired.truncate(repaired.trim_end().len());
        match repaired.chars().last() {
            Some(',') => {
                repaired.pop();
            }
            Some(':') => {
                repaired.push_str(" null");
                break;
            }
            _ => break,
        }
    }

    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn complete_document_passes_through() {
        assert_eq!(parse_partial(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn missing_close_brace() {
        assert_eq!(parse_partial(r#"{"a": 1"#), Some(json!({"a": 1})));
    }

    #[test]
    fn unterminated_string_value() {
        assert_eq!(
            parse_partial(r#"{"a": "hel"#),
            Some(json!({"a": "hel"}))
        );
    }

    #[test]
    fn nested_containers_close_in_order() {
        assert_eq!(
            parse_partial(r#"{"items": [{"name": "x"#),
            Some(json!({"items": [{"name": "x"}]}))
        );
    }

    #[test]
    fn dangling_comma_is_patched() {
        assert_eq!(parse_partial(r#"{"a": 1,"#), Some(json!({"a": 1})));
    }

    #[test]
    fn dangling_colon_gets_null() {
        assert_eq!(
            parse_partial(r#"{"a":"#),
            Some(json!({"a": null}))
        );
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(parse_partial("not json"), None);
        assert_eq!(parse_partial(""), None);
    }

    #[test]
    fn escaped_quote_inside_string() {
        assert_eq!(
            parse_partial(r#"{"a": "he said \"hi"#),
            Some(json!({"a": "he said \"hi"}))
        );
    }
}
