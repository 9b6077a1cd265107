//! Model and retrieval configuration.
//!
//! A resolved [`ModelConfig`] is built by folding overlays in priority
//! order: `default_model_config`, then `transition.model_config`, then
//! `output.model_config`.
//! Overlays only carry the fields they explicitly set, so an overlay never
//! stomps a lower layer with a default value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fully-resolved generation settings handed to a provider.
///
/// Every field has a serde default so a pipeline document may specify only
/// the settings it cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Provider name used for registry lookup.
    #[serde(default = "default_executor")]
    pub executor: String,
    #[serde(default = "default_llm_name", alias = "model_name")]
    pub llm_name: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub assistant_partial: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_input: Option<String>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub tool_use: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_options: Option<Vec<Value>>,
}

fn default_executor() -> String {
    "lorem".to_string()
}

fn default_llm_name() -> String {
    "lorem-ipsum".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.8
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            executor: default_executor(),
            llm_name: default_llm_name(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            assistant_partial: String::new(),
            partial_input: None,
            stop: Vec::new(),
            tool_use: false,
            tool_options: None,
        }
    }
}

impl ModelConfig {
    /// Apply an overlay, replacing only the fields the overlay sets.
    pub fn apply(&mut self, overlay: &ModelConfigOverlay) {
        if let Some(executor) = &overlay.executor {
            self.executor = executor.clone();
        }
        if let Some(llm_name) = &overlay.llm_name {
            self.llm_name = llm_name.clone();
        }
        if let Some(max_tokens) = overlay.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(temperature) = overlay.temperature {
            self.temperature = temperature;
        }
        if let Some(assistant_partial) = &overlay.assistant_partial {
            self.assistant_partial = assistant_partial.clone();
        }
        if let Some(partial_input) = &overlay.partial_input {
            self.partial_input = Some(partial_input.clone());
        }
        if let Some(stop) = &overlay.stop {
            self.stop = stop.clone();
        }
        if let Some(tool_use) = overlay.tool_use {
            self.tool_use = tool_use;
        }
        if let Some(tool_options) = &overlay.tool_options {
            self.tool_options = Some(tool_options.clone());
        }
    }

    /// Fold default, transition, and output layers into a resolved config.
    pub fn resolve(
        default: &ModelConfig,
        transition: Option<&ModelConfigOverlay>,
        output: Option<&ModelConfigOverlay>,
    ) -> ModelConfig {
        let mut resolved = default.clone();
        if let Some(overlay) = transition {
            resolved.apply(overlay);
        }
        if let Some(overlay) = output {
            resolved.apply(overlay);
        }
        resolved
    }
}

/// Partial [`ModelConfig`]: only set fields participate in folding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelConfigOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(default, alias = "model_name", skip_serializing_if = "Option::is_none")]
    pub llm_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_partial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_options: Option<Vec<Value>>,
}

/// Retrieval settings for `rag` outputs.
///
/// The output-level config overlays [`SynthDefinition::default_rag_config`]
/// field by field.
///
/// [`SynthDefinition::default_rag_config`]: crate::definition::SynthDefinition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub filters: Vec<Value>,
    #[serde(default = "default_rag_n")]
    pub n: u32,
}

fn default_rag_n() -> u32 {
    3
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection_name: None,
            filters: Vec::new(),
            n: default_rag_n(),
        }
    }
}

impl RagConfig {
    /// Overlay another config: set fields of `overlay` win.
    pub fn overlaid(&self, overlay: &RagConfigOverlay) -> RagConfig {
        RagConfig {
            collection_name: overlay
                .collection_name
                .clone()
                .or_else(|| self.collection_name.clone()),
            filters: overlay.filters.clone().unwrap_or_else(|| self.filters.clone()),
            n: overlay.n.unwrap_or(self.n),
        }
    }
}

/// Partial [`RagConfig`] carried on an output definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RagConfigOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_only_replaces_set_fields() {
        let default = ModelConfig::default();
        let transition = ModelConfigOverlay {
            temperature: Some(0.1),
            ..Default::default()
        };
        let output = ModelConfigOverlay {
            executor: Some("mock".to_string()),
            max_tokens: Some(64),
            ..Default::default()
        };

        let resolved = ModelConfig::resolve(&default, Some(&transition), Some(&output));

        assert_eq!(resolved.executor, "mock");
        assert_eq!(resolved.max_tokens, 64);
        assert_eq!(resolved.temperature, 0.1);
        assert_eq!(resolved.llm_name, default.llm_name);
    }

    #[test]
    fn output_overlay_wins_over_transition() {
        let default = ModelConfig::default();
        let transition = ModelConfigOverlay {
            executor: Some("transition".to_string()),
            ..Default::default()
        };
        let output = ModelConfigOverlay {
            executor: Some("output".to_string()),
            ..Default::default()
        };

        let resolved = ModelConfig::resolve(&default, Some(&transition), Some(&output));
        assert_eq!(resolved.executor, "output");
    }

    #[test]
    fn model_name_alias_deserializes() {
        let overlay: ModelConfigOverlay =
            serde_json::from_value(json!({"model_name": "mixtral"})).unwrap();
        assert_eq!(overlay.llm_name.as_deref(), Some("mixtral"));
    }

    #[test]
    fn partial_model_config_document_deserializes() {
        let config: ModelConfig =
            serde_json::from_value(json!({"executor": "mock", "max_tokens": 8})).unwrap();
        assert_eq!(config.executor, "mock");
        assert_eq!(config.max_tokens, 8);
        assert_eq!(config.temperature, 0.8);
    }

    #[test]
    fn rag_config_overlay() {
        let default = RagConfig::default();
        let overlay = RagConfigOverlay {
            n: Some(10),
            ..Default::default()
        };
        let resolved = default.overlaid(&overlay);
        assert_eq!(resolved.n, 10);
        assert!(resolved.filters.is_empty());
    }
}
