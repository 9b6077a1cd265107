//! Prediction validation for streamed prompt outputs.
//!
//! The accumulated text is validated once the provider stream closes:
//! string-typed schemas accept the raw text verbatim, everything else goes
//! through a strict JSON parse, the provider's `post_process` narrowing,
//! and draft-04 JSON Schema validation.

use crate::provider::Provider;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::sync::Arc;

/// Validate `predicted` against `schema`, returning the value to commit.
pub(crate) fn validate_prediction(
    provider: &Arc<dyn Provider>,
    schema: &Value,
    predicted: &str,
) -> Result<Value, String> {
    if schema.get("type").and_then(|t| t.as_str()) == Some("string") {
        return Ok(Value::String(predicted.to_string()));
    }

    let parsed: Value = serde_json::from_str(predicted.trim())
        .map_err(|e| format!("JSON parse failed: {e}"))?;
    let narrowed = provider.post_process(parsed);

    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft4)
        .compile(schema)
        .map_err(|e| format!("schema failed to compile: {e}"))?;

    if let Err(errors) = compiled.validate(&narrowed) {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(format!("schema validation failed: {}", messages.join("; ")));
    }
    Ok(narrowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LoremProvider;
    use serde_json::json;

    fn identity_provider() -> Arc<dyn Provider> {
        // Lorem narrows to `output`; wrap so tests can pass flat documents.
        struct Identity;
        impl Provider for Identity {
            fn generate(
                &self,
                _request: crate::provider::GenerateRequest,
            ) -> crate::BoxStream<'static, crate::provider::TokenEvent> {
                Box::pin(futures::stream::empty())
            }
        }
        Arc::new(Identity)
    }

    #[test]
    fn string_schema_accepts_raw_text() {
        let provider = identity_provider();
        let schema = json!({"type": "string"});
        let value = validate_prediction(&provider, &schema, "anything {not json").unwrap();
        assert_eq!(value, json!("anything {not json"));
    }

    #[test]
    fn truncated_json_is_a_parse_failure() {
        let provider = identity_provider();
        let schema = json!({"type": "object", "properties": {"abc": {"type": "string"}}});
        let err = validate_prediction(&provider, &schema, r#"{"abc": "def""#).unwrap_err();
        assert!(err.contains("parse failed"));
    }

    #[test]
    fn schema_mismatch_is_a_validation_failure() {
        let provider = identity_provider();
        let schema = json!({"type": "object", "properties": {"n": {"type": "integer"}}, "required": ["n"]});
        let err = validate_prediction(&provider, &schema, r#"{"x": 1}"#).unwrap_err();
        assert!(err.contains("validation failed"));
    }

    #[test]
    fn provider_post_process_runs_before_validation() {
        let provider: Arc<dyn Provider> = Arc::new(LoremProvider::new());
        let schema = json!({"type": "object", "properties": {"a": {"type": "integer"}}});
        // Lorem unwraps the `output` envelope before validation.
        let value =
            validate_prediction(&provider, &schema, r#"{"output": {"a": 2}}"#).unwrap();
        assert_eq!(value, json!({"a": 2}));
    }
}
