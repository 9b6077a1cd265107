//! Operator setup: turn an output definition plus resolved inputs into a
//! ready-to-execute call plan.
//!
//! Three pure entry points, one per externally-executed operation:
//! [`prompt_setup`], [`tool_setup`], and [`rag_query_setup`]. Setup failures
//! are reported to callers as `FAILED` events; nothing here touches memory.

use crate::config::{ModelConfig, ModelConfigOverlay, RagConfig};
use crate::definition::Output;
use crate::provider::{estimate_tokens, Provider, ProviderRegistry};
use crate::template::{render_template, TemplateError};
use crate::tool::Tool;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

/// Setup error types
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("prompt template not provided")]
    MissingPrompt,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("unknown provider '{name}'. Registered providers: {available:?}")]
    UnknownProvider {
        name: String,
        available: Vec<String>,
    },

    #[error("tool not found: '{name}'. Available tools: {available:?}")]
    ToolNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("route '{route}' not present in api spec of tool '{tool}'")]
    RouteNotInSpec { tool: String, route: String },

    #[error("invalid api endpoint for tool '{tool}': {reason}")]
    InvalidEndpoint { tool: String, reason: String },

    #[error("input_name_map value for '{key}' must be a string")]
    NonStringMapping { key: String },
}

/// Resolved prompt call plan.
pub struct SynthPlan {
    pub provider: Arc<dyn Provider>,
    pub model_config: ModelConfig,
    pub system_prompt: Option<String>,
    pub user_prompt: String,
}

impl std::fmt::Debug for SynthPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthPlan")
            .field("model_config", &self.model_config)
            .field("system_prompt", &self.system_prompt)
            .field("user_prompt", &self.user_prompt)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolTokenUsage {
    pub execution: f64,
    pub multiplier: f64,
}

/// Resolved tool call plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPlan {
    pub tool_id: String,
    pub payload: Value,
    /// Non-JSON mime types the route may answer with; non-empty means the
    /// response body is stored as a blob.
    pub output_mime_types: Vec<String>,
    pub tool_path: String,
    pub tokens: ToolTokenUsage,
}

/// Resolved retrieval query.
#[derive(Debug, Clone, PartialEq)]
pub struct RagQuery {
    pub query: String,
    pub config: RagConfig,
}

/// Build the prompt call plan: fold the model config overlays, render both
/// prompts, and resolve the provider.
pub fn prompt_setup(
    output: &Output,
    inputs: &Value,
    default_model_config: &ModelConfig,
    transition_config: Option<&ModelConfigOverlay>,
    providers: &ProviderRegistry,
) -> Result<SynthPlan, SetupError> {
    let user_template = output.prompt.as_deref().ok_or(SetupError::MissingPrompt)?;
    let user_prompt = render_template(user_template, inputs)?;
    tracing::debug!(prompt = %user_prompt, "user prompt rendered");

    let system_prompt = match output.system_prompt.as_deref() {
        Some(template) => Some(render_template(template, inputs)?),
        None => None,
    };

    let model_config = ModelConfig::resolve(
        default_model_config,
        transition_config,
        output.model_config.as_ref(),
    );
    tracing::debug!(?model_config, "model config resolved");

    let provider =
        providers
            .get(&model_config.executor)
            .ok_or_else(|| SetupError::UnknownProvider {
                name: model_config.executor.clone(),
                available: providers.names().iter().map(|s| s.to_string()).collect(),
            })?;

    Ok(SynthPlan {
        provider,
        model_config,
        system_prompt,
        user_prompt,
    })
}

/// Build the tool call plan: locate the tool, join the POST URL, map the
/// payload, and compute declared token accounting.
pub fn tool_setup(
    tools: &[Tool],
    output: &Output,
    inputs: &Value,
) -> Result<ToolPlan, SetupError> {
    let tool_name = output.tool.as_deref().unwrap_or_default();
    let tool = tools
        .iter()
        .find(|tool| tool.name == tool_name)
        .ok_or_else(|| SetupError::ToolNotFound {
            name: tool_name.to_string(),
            available: tools.iter().map(|tool| tool.name.clone()).collect(),
        })?;

    Url::parse(&tool.api_endpoint).map_err(|e| SetupError::InvalidEndpoint {
        tool: tool.name.clone(),
        reason: e.to_string(),
    })?;

    // `route` is guaranteed present by definition validation.
    let route = output.route.as_deref().unwrap_or_default();
    let tool_path = format!("{}{}", tool.api_endpoint, route);

    let output_mime_types = tool
        .api_spec
        .get("paths")
        .and_then(|paths| paths.get(route))
        .ok_or_else(|| SetupError::RouteNotInSpec {
            tool: tool.name.clone(),
            route: route.to_string(),
        })?
        .get("post")
        .and_then(|post| post.get("responses"))
        .and_then(|responses| responses.get("200"))
        .and_then(|ok| ok.get("content"))
        .and_then(|content| content.as_object())
        .map(|content| {
            content
                .keys()
                .filter(|mime| mime.as_str() != "application/json")
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let empty = Map::new();
    let name_map = output.input_name_map.as_ref().unwrap_or(&empty);
    let mut payload = Map::new();
    for (key, value) in name_map {
        let mapping = value
            .as_str()
            .ok_or_else(|| SetupError::NonStringMapping { key: key.clone() })?;
        let resolved = match inputs.get(mapping) {
            Some(direct) => direct.clone(),
            None => Value::String(render_template(mapping, inputs)?),
        };
        payload.insert(key.clone(), resolved);
    }
    tracing::debug!(?payload, "tool payload mapped");

    let multiplier = if tool.token_multiplier != 0.0 {
        let raw_tokens: u32 = payload
            .values()
            .map(|value| match value {
                Value::String(text) => estimate_tokens(text),
                other => estimate_tokens(&other.to_string()),
            })
            .sum();
        f64::from(raw_tokens) * tool.token_multiplier
    } else {
        0.0
    };

    Ok(ToolPlan {
        tool_id: tool.id.clone(),
        payload: Value::Object(payload),
        output_mime_types,
        tool_path,
        tokens: ToolTokenUsage {
            execution: tool.tokens_per_execution,
            multiplier,
        },
    })
}

/// Build the retrieval query: render the query template and overlay the
/// output's RAG config on the pipeline default.
pub fn rag_query_setup(
    output: &Output,
    inputs: &Value,
    default_rag_config: &RagConfig,
) -> Result<RagQuery, SetupError> {
    let template = output.rag.as_deref().ok_or(SetupError::MissingPrompt)?;
    let query = render_template(template, inputs)?;
    tracing::debug!(query = %query, "rag query rendered");

    let config = match output.rag_config.as_ref() {
        Some(overlay) => default_rag_config.overlaid(overlay),
        None => default_rag_config.clone(),
    };

    Ok(RagQuery { query, config })
}
