//! Runtime events emitted by the streaming driver.
//!
//! Every observable step of a transition is surfaced as a tagged [`Event`].
//! Failures travel through the same channel instead of a separate error
//! path, so a consumer can render partial progress before a late failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::Transition;

/// Side of the token accounting a streamed chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStage {
    Input,
    Output,
}

/// Which text triggered a moderation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyStage {
    Prompt,
    Response,
}

/// Unified event enum yielded by [`Synth::streaming_trigger`].
///
/// [`Synth::streaming_trigger`]: crate::machine::Synth::streaming_trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Interface update for the state the machine is moving toward.
    #[serde(rename = "MACHINE_UPDATE")]
    MachineUpdate {
        transitions: Vec<Transition>,
        memory: Value,
        state: String,
        active_trigger: String,
    },

    /// The named output is now being produced.
    #[serde(rename = "SET_ACTIVE_OUTPUT")]
    SetActiveOutput { key: String },

    /// A memory slot was (re)written.
    #[serde(rename = "SET_MEMORY")]
    SetMemory { key: String, value: Value },

    /// The resolved inputs for the output about to run.
    #[serde(rename = "INPUTS")]
    Inputs { inputs: Value },

    /// The provider selected for a prompt output.
    #[serde(rename = "MODEL_CONFIG")]
    ModelConfig { key: String, executor: String },

    /// One streamed token, with per-chunk cost accounting.
    #[serde(rename = "CHUNK")]
    Chunk {
        key: String,
        token: String,
        chunk_cost: u32,
        tokens: u32,
        stage: TokenStage,
        llm_name: String,
    },

    /// A tool call completed and its token usage was recorded.
    #[serde(rename = "TOOL_OUTPUT")]
    ToolOutput {
        key: String,
        token_usage: f64,
        tool_id: String,
    },

    /// A jq post-process produced a non-empty result.
    #[serde(rename = "JQ")]
    Jq { key: String, result: Value },

    /// Moderation verdict for a prompt or response.
    #[serde(rename = "SAFETY")]
    Safety {
        key: String,
        stage: SafetyStage,
        response: Value,
    },

    #[serde(rename = "OUTPUT_VALIDATION_SUCCEEDED")]
    OutputValidationSucceeded { key: String },

    /// Schema validation exhausted its retries; state rewinds to the
    /// transition source.
    #[serde(rename = "OUTPUT_VALIDATION_FAILED")]
    OutputValidationFailed { key: String },

    #[serde(rename = "OUTPUT_COMPLETED")]
    OutputCompleted { key: String },

    #[serde(rename = "TRANSITION_COMPLETED")]
    TransitionCompleted { trigger: String },

    /// An operation failed (template, tool, udf, rag setup, ...).
    #[serde(rename = "FAILED")]
    Failed { key: String, reason: String },

    #[serde(rename = "LOOP_FAILED")]
    LoopFailed { key: String, reason: String },

    /// Moderation flagged the prompt or the response; the transition aborts.
    #[serde(rename = "SAFETY_FAILURE")]
    SafetyFailure { key: String, stage: SafetyStage },

    #[serde(rename = "NOT_IMPLEMENTED")]
    NotImplemented { key: String, reason: String },
}

impl Event {
    /// Failure events abort the remainder of the current transition.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::Failed { .. }
                | Event::LoopFailed { .. }
                | Event::OutputValidationFailed { .. }
                | Event::SafetyFailure { .. }
                | Event::NotImplemented { .. }
        )
    }
}
