//! Streaming executor for `prompt` outputs.
//!
//! Drives the provider token stream while accumulating the prediction,
//! accounting tokens per side, gating both prompt and response through
//! moderation, and running the validate-or-retry loop. Validation failure
//! after the retry budget rewinds the machine to the transition source and
//! discards anything the failing output wrote.

use crate::events::{Event, SafetyStage, TokenStage};
use crate::machine::dispatch::OutputContext;
use crate::machine::validation::validate_prediction;
use crate::machine::Synth;
use crate::provider::GenerateRequest;
use crate::setup::prompt_setup;
use async_stream::stream;
use futures::Stream;
use futures::StreamExt;
use serde_json::json;

impl Synth {
    /// Stream one prompt output. Ends after the commit on success, or after
    /// a failure event (the caller aborts on any failure it sees).
    pub(crate) fn run_prompt<'a>(
        &'a mut self,
        ctx: OutputContext,
    ) -> impl Stream<Item = Event> + 'a {
        stream! {
            let key = ctx.output.key.clone();
            let schema = ctx.output.schema.clone().unwrap_or_else(|| json!({}));

            let plan = match prompt_setup(
                &ctx.output,
                &ctx.inputs,
                &self.definition.default_model_config,
                ctx.transition.model_config.as_ref(),
                &self.providers,
            ) {
                Ok(plan) => plan,
                Err(err) => {
                    tracing::error!(key = %key, %err, "prompt setup failed");
                    yield Event::Failed { key, reason: err.to_string() };
                    return;
                }
            };

            let executor = plan.model_config.executor.clone();
            let llm_name = plan.model_config.llm_name.clone();

            let prompt_text = match &plan.system_prompt {
                Some(system) => format!("{system}\n{}", plan.user_prompt),
                None => plan.user_prompt.clone(),
            };
            let verdict = self.safety.check(&prompt_text, &executor).await;
            yield Event::Safety {
                key: key.clone(),
                stage: SafetyStage::Prompt,
                response: serde_json::to_value(&verdict).unwrap_or_default(),
            };
            if verdict.flagged() {
                tracing::warn!(key = %key, "prompt flagged by moderation");
                yield Event::SafetyFailure { key, stage: SafetyStage::Prompt };
                return;
            }

            // Everything the failing output may have written gets restored
            // on terminal validation failure.
            let prior = self.memory.get(&key).cloned();
            let mut retries = self.retries;

            loop {
                yield Event::ModelConfig {
                    key: key.clone(),
                    executor: executor.clone(),
                };
                tracing::debug!(key = %key, executor = %executor, "execution started");

                let request = GenerateRequest {
                    user_prompt: plan.user_prompt.clone(),
                    system_prompt: plan.system_prompt.clone(),
                    schema: ctx.output.schema.clone(),
                    model_config: plan.model_config.clone(),
                    user_id: self.user.clone(),
                };

                let mut predicted = String::new();
                let mut input_tokens = 0u32;
                let mut output_tokens = 0u32;

                let mut tokens = plan.provider.generate(request);
                while let Some(event) = tokens.next().await {
                    predicted.push_str(&event.token);
                    let chunk_cost = self
                        .cost
                        .calculate_chunk_cost(event.stage, &plan.model_config, event.tokens)
                        .await;
                    match event.stage {
                        TokenStage::Input => input_tokens += chunk_cost,
                        TokenStage::Output => output_tokens += chunk_cost,
                    }
                    yield Event::Chunk {
                        key: key.clone(),
                        token: event.token.clone(),
                        chunk_cost,
                        tokens: event.tokens,
                        stage: event.stage,
                        llm_name: llm_name.clone(),
                    };
                    for task in &ctx.post_tasks {
                        if let Some(event) = self.post_process(task, &event.token) {
                            yield event;
                        }
                    }
                }
                drop(tokens);

                self.cost
                    .record_prompt_token_usage(
                        &self.user,
                        &self.session_id,
                        &plan.model_config,
                        input_tokens,
                        output_tokens,
                    )
                    .await;
                tracing::debug!(key = %key, "execution complete");

                let verdict = self.safety.check(&predicted, &executor).await;
                yield Event::Safety {
                    key: key.clone(),
                    stage: SafetyStage::Response,
                    response: serde_json::to_value(&verdict).unwrap_or_default(),
                };
                if verdict.flagged() {
                    tracing::warn!(key = %key, "response flagged by moderation");
                    yield Event::SafetyFailure { key, stage: SafetyStage::Response };
                    return;
                }

                match validate_prediction(&plan.provider, &schema, &predicted) {
                    Ok(value) => {
                        tracing::debug!(key = %key, "validated");
                        yield Event::OutputValidationSucceeded { key: key.clone() };
                        if ctx.is_loop {
                            self.memory.append(&key, value);
                        } else {
                            self.memory.set(&key, value);
                        }
                        return;
                    }
                    Err(reason) => {
                        tracing::error!(key = %key, reason = %reason, "failed validation");
                        if retries > 0 {
                            tracing::warn!(key = %key, retries, "retrying");
                            retries -= 1;
                            self.clear_buffer(&key);
                            continue;
                        }
                        yield Event::OutputValidationFailed { key: key.clone() };
                        match &prior {
                            Some(value) => self.memory.set(&key, value.clone()),
                            None => self.memory.remove(&key),
                        }
                        self.clear_buffer(&key);
                        self.machine.force(&ctx.transition.source);
                        return;
                    }
                }
            }
        }
    }
}
