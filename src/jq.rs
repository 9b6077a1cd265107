//! jq-style post-processing filters.
//!
//! Outputs may declare a `jq` program that reshapes the speculative document
//! built during streaming. The supported subset covers the programs pipeline
//! authors actually write: identity, field access, array indexing, `[]`
//! iteration, pipes, and `[ ... ]` collection.
//!
//! Evaluation follows jq's stream model: a filter maps each input value to
//! zero or more output values. The output's schema acts as a hint for how
//! results are returned - object and string schemas take the first match,
//! everything else takes all matches.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JqError {
    #[error("invalid jq program: {0}")]
    Parse(String),
}

/// One stage of a pipe.
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    /// `.`
    Identity,
    /// `.a.b[0][]`
    Path(Vec<Segment>),
    /// `[ <program> ]`
    Collect(Vec<Filter>),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Iterate,
}

/// Compile and run `program` against `data`, applying the schema hint.
///
/// Returns `None` for empty results or unparseable programs - post-processing
/// is best-effort and never fails an output.
pub fn run_jq(program: &str, data: &Value, schema: Option<&Value>) -> Option<Value> {
    let filters = match parse_program(program) {
        Ok(filters) => filters,
        Err(err) => {
            tracing::warn!("post-process program rejected: {err}");
            return None;
        }
    };

    let matches = eval_pipe(&filters, data);

    let first_only = schema
        .and_then(|s| s.get("type"))
        .and_then(|t| t.as_str())
        .map(|t| t == "object" || t == "string")
        .unwrap_or(false);

    if first_only {
        matches.into_iter().next().filter(is_truthy)
    } else if matches.is_empty() {
        None
    } else {
        Some(Value::Array(matches))
    }
}

/// Python-style truthiness: null, `false`, `0`, `""`, `[]`, and `{}` are
/// all treated as "no result".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

fn parse_program(program: &str) -> Result<Vec<Filter>, JqError> {
    let parts = split_pipes(program)?;
    if parts.is_empty() {
        return Err(JqError::Parse("empty program".to_string()));
    }
    parts.iter().map(|part| parse_filter(part)).collect()
}

/// Split on `|` at nesting depth zero, respecting strings and brackets.
fn split_pipes(program: &str) -> Result<Vec<String>, JqError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;

    for ch in program.chars() {
        if in_string {
            current.push(ch);
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(JqError::Parse("unbalanced brackets".to_string()));
                }
                current.push(ch);
            }
            '|' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if depth != 0 || in_string {
        return Err(JqError::Parse("unbalanced brackets".to_string()));
    }
    parts.push(current.trim().to_string());
    Ok(parts)
}

fn parse_filter(part: &str) -> Result<Filter, JqError> {
    let part = part.trim();
    if part == "." {
        return Ok(Filter::Identity);
    }
    if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        return Ok(Filter::Collect(parse_program(inner)?));
    }
    if let Some(rest) = part.strip_prefix('.') {
        return Ok(Filter::Path(parse_segments(rest)?));
    }
    Err(JqError::Parse(format!("unsupported filter: {part}")))
}

fn parse_segments(path: &str) -> Result<Vec<Segment>, JqError> {
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '.' => {
                chars.next();
            }
            '[' => {
                chars.next();
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let inner = inner.trim();
                if inner.is_empty() {
                    segments.push(Segment::Iterate);
                } else if let Some(quoted) =
                    inner.strip_prefix('"').and_then(|s| s.strip_suffix('"'))
                {
                    segments.push(Segment::Field(quoted.to_string()));
                } else {
                    let index = inner
                        .parse::<i64>()
                        .map_err(|_| JqError::Parse(format!("bad index: {inner}")))?;
                    segments.push(Segment::Index(index));
                }
            }
            _ => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(JqError::Parse(format!("bad path segment near: {path}")));
                }
                segments.push(Segment::Field(name));
            }
        }
    }
    Ok(segments)
}

fn eval_pipe(filters: &[Filter], input: &Value) -> Vec<Value> {
    let mut values = vec![input.clone()];
    for filter in filters {
        values = values
            .iter()
            .flat_map(|value| eval_filter(filter, value))
            .collect();
    }
    values
}

fn eval_filter(filter: &Filter, input: &Value) -> Vec<Value> {
    match filter {
        Filter::Identity => vec![input.clone()],
        Filter::Path(segments) => eval_path(segments, input),
        Filter::Collect(inner) => vec![Value::Array(eval_pipe(inner, input))],
    }
}

fn eval_path(segments: &[Segment], input: &Value) -> Vec<Value> {
    let mut values = vec![input.clone()];
    for segment in segments {
        values = values
            .into_iter()
            .flat_map(|value| match segment {
                Segment::Field(name) => {
                    value.get(name.as_str()).cloned().into_iter().collect::<Vec<_>>()
                }
                Segment::Index(index) => {
                    let items = match value.as_array() {
                        Some(items) => items,
                        None => return Vec::new(),
                    };
                    let resolved = if *index < 0 {
                        items.len().checked_sub(index.unsigned_abs() as usize)
                    } else {
                        Some(*index as usize)
                    };
                    resolved
                        .and_then(|i| items.get(i))
                        .cloned()
                        .into_iter()
                        .collect()
                }
                Segment::Iterate => match value {
                    Value::Array(items) => items,
                    Value::Object(entries) => entries.into_iter().map(|(_, v)| v).collect(),
                    _ => Vec::new(),
                },
            })
            .collect();
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_returns_all() {
        let data = json!({"a": 1});
        let result = run_jq(".", &data, None).unwrap();
        assert_eq!(result, json!([{"a": 1}]));
    }

    #[test]
    fn field_access_with_object_schema_takes_first() {
        let data = json!({"user": {"name": "ada"}});
        let schema = json!({"type": "object"});
        let result = run_jq(".user", &data, Some(&schema)).unwrap();
        assert_eq!(result, json!({"name": "ada"}));
    }

    #[test]
    fn iteration_flattens_nested_lists() {
        let data = json!({"groups": [[1, 2], [3], [4, 5, 6]]});
        let result = run_jq(".groups[][]", &data, None).unwrap();
        assert_eq!(result, json!([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn pipe_and_collect() {
        let data = json!({"items": [{"name": "a"}, {"name": "b"}]});
        let result = run_jq("[.items[] | .name]", &data, None).unwrap();
        assert_eq!(result, json!([["a", "b"]]));
    }

    #[test]
    fn negative_index() {
        let data = json!({"items": [1, 2, 3]});
        let schema = json!({"type": "string"});
        let result = run_jq(".items[-1]", &data, Some(&schema));
        // 3 with a string schema hint: first match, but 3 is truthy
        assert_eq!(result, Some(json!(3)));
    }

    #[test]
    fn missing_path_yields_none() {
        let data = json!({"a": 1});
        assert_eq!(run_jq(".b.c", &data, None), None);
    }

    #[test]
    fn empty_first_match_is_not_committed() {
        let data = json!({"text": ""});
        let schema = json!({"type": "string"});
        assert_eq!(run_jq(".text", &data, Some(&schema)), None);
    }

    #[test]
    fn invalid_program_yields_none() {
        let data = json!({});
        assert_eq!(run_jq("][", &data, None), None);
        assert_eq!(run_jq("keys", &data, None), None);
    }
}
