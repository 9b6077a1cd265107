//! Pipeline definition layer.
//!
//! This module parses pipeline documents (JSON values, JSON text, or YAML
//! text) into a typed, immutable [`SynthDefinition`] and validates every
//! structural invariant up front, so the orchestrator never has to re-check
//! the document shape at run time.

pub mod validator;

use crate::config::{ModelConfig, ModelConfigOverlay, RagConfig, RagConfigOverlay};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition error types
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("failed to parse pipeline document: {0}")]
    Parse(String),

    #[error("initial_state '{state}' is not a valid state name. Must be one of {available:?}")]
    UnknownInitialState {
        state: String,
        available: Vec<String>,
    },

    #[error("transition '{trigger}' references unknown {field} state '{state}'")]
    UnknownTransitionState {
        trigger: String,
        field: &'static str,
        state: String,
    },

    #[error("after value '{after}' is not part of available triggers {available:?}")]
    UnknownAfterTrigger {
        after: String,
        available: Vec<String>,
    },

    #[error("all prompts require a schema. Not set on: {key}")]
    MissingSchema { key: String },

    #[error("all tools require `route` to be set, not set on: {key}")]
    MissingRoute { key: String },
}

/// UI component binding exposed through `MACHINE_UPDATE` events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interface {
    #[serde(rename = "componentName")]
    pub component_name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct State {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<Vec<Interface>>,
}

/// Input slot: names a memory key a transition reads, plus display hints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Input {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_type: Option<String>,
}

/// Loop matrix: each entry binds a loop variable to a memory key holding a
/// list, or to a literal list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Loop {
    #[serde(default)]
    pub matrix: Vec<Map<String, Value>>,
}

/// The operations an output can carry, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Append,
    Interleave,
    Jinja,
    Prompt,
    Reset,
    Udf,
    Tool,
    Rag,
}

/// One produced value within a transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, rename = "model_config", skip_serializing_if = "Option::is_none")]
    pub model_config: Option<ModelConfigOverlay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jinja: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interleave: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_name_map: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_config: Option<RagConfigOverlay>,
    /// RAG sub-operation; only "query" is implemented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jq: Option<String>,
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_config: Option<Loop>,
}

impl Output {
    /// Resolve the single operation this output executes. When several
    /// operation fields are present the earliest in priority order wins;
    /// an output with none is a no-op.
    pub fn operation_kind(&self) -> Option<Operation> {
        if self.append.is_some() {
            Some(Operation::Append)
        } else if self.interleave.is_some() {
            Some(Operation::Interleave)
        } else if self.jinja.is_some() {
            Some(Operation::Jinja)
        } else if self.prompt.is_some() {
            Some(Operation::Prompt)
        } else if self.reset == Some(true) {
            Some(Operation::Reset)
        } else if self.udf.is_some() {
            Some(Operation::Udf)
        } else if self.tool.is_some() {
            Some(Operation::Tool)
        } else if self.rag.is_some() {
            Some(Operation::Rag)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub trigger: String,
    pub source: String,
    pub dest: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub outputs: Vec<Output>,
    /// Next trigger to fire automatically, or `memory_key:<k>` to read the
    /// next trigger from memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, rename = "model_config", skip_serializing_if = "Option::is_none")]
    pub model_config: Option<ModelConfigOverlay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

/// Display metadata for shared pipelines.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShareProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Parsed, validated pipeline document. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthDefinition {
    pub initial_state: String,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub initial_memory: Map<String, Value>,
    #[serde(default)]
    pub default_model_config: ModelConfig,
    #[serde(default)]
    pub default_rag_config: RagConfig,
    #[serde(default, rename = "shareProfile", skip_serializing_if = "Option::is_none")]
    pub share_profile: Option<ShareProfile>,
}

impl SynthDefinition {
    /// Parse and validate a pipeline document given as a JSON value.
    pub fn from_value(document: Value) -> Result<Self, DefinitionError> {
        let definition: SynthDefinition = serde_json::from_value(document)
            .map_err(|e| DefinitionError::Parse(e.to_string()))?;
        validator::validate(&definition)?;
        Ok(definition)
    }

    /// Parse and validate a pipeline document given as JSON text.
    pub fn from_json_str(document: &str) -> Result<Self, DefinitionError> {
        let value: Value =
            serde_json::from_str(document).map_err(|e| DefinitionError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse and validate a pipeline document given as YAML text.
    pub fn from_yaml_str(document: &str) -> Result<Self, DefinitionError> {
        let value: Value =
            serde_yaml::from_str(document).map_err(|e| DefinitionError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|state| state.name == name)
    }

    pub fn state_names(&self) -> Vec<String> {
        self.states.iter().map(|state| state.name.clone()).collect()
    }

    pub fn transition_for_trigger(&self, trigger: &str) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|transition| transition.trigger == trigger)
    }

    /// All transitions whose source is `state`, in declaration order.
    pub fn transitions_available_from(&self, state: &str) -> Vec<&Transition> {
        self.transitions
            .iter()
            .filter(|transition| transition.source == state)
            .collect()
    }

    pub fn trigger_names(&self) -> Vec<String> {
        self.transitions
            .iter()
            .map(|transition| transition.trigger.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_document() -> Value {
        json!({
            "initial_state": "a",
            "states": [{"name": "a"}, {"name": "b"}],
            "transitions": [
                {"trigger": "go", "source": "a", "dest": "b"}
            ]
        })
    }

    #[test]
    fn parses_minimal_document() {
        let definition = SynthDefinition::from_value(minimal_document()).unwrap();
        assert_eq!(definition.initial_state, "a");
        assert_eq!(definition.transitions.len(), 1);
        assert!(definition.initial_memory.is_empty());
        assert_eq!(definition.default_model_config.executor, "lorem");
    }

    #[test]
    fn parses_yaml_document() {
        let yaml = r#"
initial_state: a
states:
  - name: a
  - name: b
transitions:
  - trigger: go
    source: a
    dest: b
"#;
        let definition = SynthDefinition::from_yaml_str(yaml).unwrap();
        assert_eq!(definition.transition_for_trigger("go").unwrap().dest, "b");
    }

    #[test]
    fn operation_priority_tie_break() {
        let output: Output = serde_json::from_value(json!({
            "key": "out",
            "jinja": "{{ a }}",
            "prompt": "ignored",
            "schema": {"type": "string"}
        }))
        .unwrap();
        assert_eq!(output.operation_kind(), Some(Operation::Jinja));
    }

    #[test]
    fn reset_false_is_not_an_operation() {
        let output: Output =
            serde_json::from_value(json!({"key": "out", "reset": false})).unwrap();
        assert_eq!(output.operation_kind(), None);
    }

    #[test]
    fn transitions_available_from_filters_by_source() {
        let definition = SynthDefinition::from_value(json!({
            "initial_state": "a",
            "states": [{"name": "a"}, {"name": "b"}],
            "transitions": [
                {"trigger": "go", "source": "a", "dest": "b"},
                {"trigger": "back", "source": "b", "dest": "a"},
                {"trigger": "again", "source": "a", "dest": "a"}
            ]
        }))
        .unwrap();

        let from_a: Vec<&str> = definition
            .transitions_available_from("a")
            .iter()
            .map(|t| t.trigger.as_str())
            .collect();
        assert_eq!(from_a, ["go", "again"]);
    }
}
