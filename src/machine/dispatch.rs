//! Output dispatcher: run exactly one operation per output and commit the
//! result to memory.
//!
//! Operation selection follows the declaration-order priority of the
//! definition layer (`append`, `interleave`, `jinja`, `prompt`, `reset`,
//! `udf`, `tool`, `rag`); an output carrying several operation fields runs
//! the highest-priority one, and an output with none is a no-op that still
//! completes.

use crate::definition::{Operation, Output, Transition};
use crate::events::Event;
use crate::machine::Synth;
use crate::setup::{rag_query_setup, tool_setup};
use crate::template::render_template;
use crate::tool::run_tool;
use async_stream::stream;
use futures::{pin_mut, Stream, StreamExt};
use serde_json::{json, Map, Value};

/// Everything one output run needs, owned so nested generators can borrow
/// the orchestrator freely.
#[derive(Clone)]
pub(crate) struct OutputContext {
    pub transition: Transition,
    pub output: Output,
    pub inputs: Value,
    pub is_loop: bool,
    /// Outputs of the enclosing transition that declare a jq post-process.
    pub post_tasks: Vec<Output>,
}

impl Synth {
    /// Run one output to completion: `SET_ACTIVE_OUTPUT`, `SET_MEMORY`,
    /// `INPUTS`, the operation's own events, and `OUTPUT_COMPLETED` on
    /// success. A failure event ends the stream without completion.
    pub(crate) fn run_output<'a>(
        &'a mut self,
        ctx: OutputContext,
    ) -> impl Stream<Item = Event> + 'a {
        stream! {
            let key = ctx.output.key.clone();
            tracing::info!(trigger = %ctx.transition.trigger, key = %key, "starting output");

            yield Event::SetActiveOutput { key: key.clone() };
            yield Event::SetMemory {
                key: key.clone(),
                value: self.memory.get_or(&key, json!({})),
            };
            yield Event::Inputs { inputs: ctx.inputs.clone() };

            match ctx.output.operation_kind() {
                Some(Operation::Append) => {
                    let memory_keys = ctx.output.append.clone().unwrap_or_default();
                    if self.memory.get(&key).is_none() {
                        self.memory.set(&key, json!([]));
                    }
                    for memory_key in memory_keys {
                        if let Some(item) = self.memory.get(&memory_key).cloned() {
                            if !item.is_null() {
                                self.memory.append(&key, item);
                            }
                        }
                    }
                    yield Event::SetMemory {
                        key: key.clone(),
                        value: self.memory.get_or(&key, Value::Null),
                    };
                }

                Some(Operation::Interleave) => {
                    let source_keys = ctx.output.interleave.clone().unwrap_or_default();
                    let interleaved = self.interleave(&source_keys);
                    self.memory.set(&key, interleaved.clone());
                    yield Event::SetMemory { key: key.clone(), value: interleaved };
                }

                Some(Operation::Jinja) => {
                    let template = ctx.output.jinja.clone().unwrap_or_default();
                    match render_template(&template, &ctx.inputs) {
                        Ok(text) => {
                            self.memory.set(&key, json!(text));
                            yield Event::SetMemory { key: key.clone(), value: json!(text) };
                        }
                        Err(err) => {
                            tracing::error!(key = %key, %err, "jinja render failed");
                            yield Event::Failed { key, reason: err.to_string() };
                            return;
                        }
                    }
                }

                Some(Operation::Prompt) => {
                    let prompt = self.run_prompt(ctx.clone());
                    pin_mut!(prompt);
                    while let Some(event) = prompt.next().await {
                        let failed = event.is_failure();
                        yield event;
                        if failed {
                            return;
                        }
                    }
                }

                Some(Operation::Reset) => {
                    let empty = match self.memory.get(&key) {
                        Some(Value::Array(_)) => json!([]),
                        Some(Value::String(_)) => json!(""),
                        _ => json!({}),
                    };
                    self.memory.set(&key, empty);
                }

                Some(Operation::Udf) => {
                    let name = ctx.output.udf.clone().unwrap_or_default();
                    tracing::debug!(key = %key, name = %name, "running user defined function");
                    match self.udfs.get(&name) {
                        Some(function) => {
                            let value = function(&self.memory);
                            self.memory.set(&key, value);
                        }
                        None => {
                            yield Event::Failed {
                                key,
                                reason: format!(
                                    "Method: {name} not in registered user defined functions: {:?}",
                                    self.udfs.names()
                                ),
                            };
                            return;
                        }
                    }
                }

                Some(Operation::Tool) => {
                    let plan = match tool_setup(&self.tools, &ctx.output, &ctx.inputs) {
                        Ok(plan) => plan,
                        Err(err) => {
                            tracing::error!(key = %key, %err, "tool setup failed");
                            yield Event::Failed { key, reason: err.to_string() };
                            return;
                        }
                    };
                    tracing::info!(key = %key, tool_path = %plan.tool_path, "calling tool");

                    let result = match run_tool(&self.http, &*self.store, &plan).await {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::error!(key = %key, %err, "tool call failed");
                            yield Event::Failed {
                                key,
                                reason: format!("Failed to call tool: {err}"),
                            };
                            return;
                        }
                    };

                    if ctx.is_loop {
                        self.memory.append(&key, result.clone());
                    } else {
                        self.memory.set(&key, result.clone());
                    }

                    let token_usage = self
                        .cost
                        .record_tool_token_usage(
                            &self.user,
                            &self.session_id,
                            &plan,
                            plan.tokens.execution,
                        )
                        .await;
                    yield Event::ToolOutput {
                        key: key.clone(),
                        token_usage,
                        tool_id: plan.tool_id.clone(),
                    };
                    yield Event::SetMemory { key: key.clone(), value: result };
                }

                Some(Operation::Rag) => {
                    match ctx.output.operation.as_deref().unwrap_or("query") {
                        "query" => {
                            let query = match rag_query_setup(
                                &ctx.output,
                                &ctx.inputs,
                                &self.definition.default_rag_config,
                            ) {
                                Ok(query) => query,
                                Err(err) => {
                                    tracing::error!(key = %key, %err, "RAG query setup failure");
                                    yield Event::Failed { key, reason: err.to_string() };
                                    return;
                                }
                            };
                            let retriever = match &self.retriever {
                                Some(retriever) => retriever.clone(),
                                None => {
                                    yield Event::Failed {
                                        key,
                                        reason: "no retriever configured".to_string(),
                                    };
                                    return;
                                }
                            };
                            match retriever.query(&query.query, &query.config).await {
                                Ok(result) => self.memory.set(&key, result),
                                Err(err) => {
                                    tracing::error!(key = %key, %err, "retrieval failed");
                                    yield Event::Failed { key, reason: err.to_string() };
                                    return;
                                }
                            }
                        }
                        other => {
                            yield Event::NotImplemented {
                                key,
                                reason: format!("RAG operation: {other} not implemented yet"),
                            };
                            return;
                        }
                    }
                }

                // No operation field: the output is a no-op.
                None => {}
            }

            yield Event::OutputCompleted { key };
        }
    }

    /// Zip the referenced memory lists by position, longest list winning.
    /// Object items merge into one object per position; other items bind
    /// under the key `"interleave"`.
    fn interleave(&self, source_keys: &[String]) -> Value {
        let lists: Vec<Vec<Value>> = source_keys
            .iter()
            .filter_map(|source| self.memory.get(source))
            .filter_map(|value| match value {
                Value::Array(items) if !items.is_empty() => Some(items.clone()),
                Value::Array(_) | Value::Null => None,
                other => Some(vec![other.clone()]),
            })
            .collect();

        let longest = lists.iter().map(Vec::len).max().unwrap_or(0);
        let mut interleaved = Vec::with_capacity(longest);
        for position in 0..longest {
            let mut entry = Map::new();
            for list in &lists {
                match list.get(position) {
                    Some(Value::Object(fields)) => {
                        for (field, value) in fields {
                            entry.insert(field.clone(), value.clone());
                        }
                    }
                    Some(other) => {
                        entry.insert("interleave".to_string(), other.clone());
                    }
                    None => {}
                }
            }
            interleaved.push(Value::Object(entry));
        }
        Value::Array(interleaved)
    }
}
