//! Transition runner: the per-trigger driver behind `streaming_trigger`.
//!
//! Iterates a transition's outputs in declaration order, expands loop
//! matrices, flushes post-processors, fires the state transition, and
//! follows `after` chains. Any failure event aborts the remainder of the
//! transition immediately.

use crate::events::Event;
use crate::machine::dispatch::OutputContext;
use crate::machine::Synth;
use async_stream::stream;
use futures::{pin_mut, Stream, StreamExt};
use serde_json::{Map, Value};

impl Synth {
    /// Drive `initial_trigger` and any chained `after` triggers. The caller
    /// has already checked availability and merged params.
    pub(crate) fn run_transitions(
        &mut self,
        initial_trigger: String,
    ) -> impl Stream<Item = Event> + '_ {
        stream! {
            let mut transition = match self.definition.transition_for_trigger(&initial_trigger) {
                Some(transition) => transition.clone(),
                None => return,
            };

            // State-level loop, facilitates `after` chaining.
            loop {
                // Show the interface for the *next* state.
                yield self.machine_update(&transition, true, None);

                let post_tasks: Vec<_> = transition
                    .outputs
                    .iter()
                    .filter(|output| output.jq.is_some())
                    .cloned()
                    .collect();

                for output in transition.outputs.clone() {
                    let key = output.key.clone();
                    let inputs = self.transition_inputs(&transition);

                    if let Some(loop_config) = output.loop_config.clone() {
                        // Looped output: accumulate one list entry per item.
                        self.memory.set(&key, Value::Array(Vec::new()));
                        for matrix in &loop_config.matrix {
                            for (loop_var, binding) in matrix {
                                for item in self.resolve_loop_items(binding) {
                                    let mut loop_inputs = match &inputs {
                                        Value::Object(entries) => entries.clone(),
                                        _ => Map::new(),
                                    };
                                    loop_inputs.insert(loop_var.clone(), item);

                                    let ctx = OutputContext {
                                        transition: transition.clone(),
                                        output: output.clone(),
                                        inputs: Value::Object(loop_inputs),
                                        is_loop: true,
                                        post_tasks: post_tasks.clone(),
                                    };
                                    let events = self.run_output(ctx);
                                    pin_mut!(events);
                                    while let Some(event) = events.next().await {
                                        let failed = event.is_failure();
                                        yield event;
                                        if failed {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    } else {
                        let ctx = OutputContext {
                            transition: transition.clone(),
                            output: output.clone(),
                            inputs: inputs.clone(),
                            is_loop: false,
                            post_tasks: post_tasks.clone(),
                        };
                        let events = self.run_output(ctx);
                        pin_mut!(events);
                        while let Some(event) = events.next().await {
                            let failed = event.is_failure();
                            yield event;
                            if failed {
                                return;
                            }
                        }
                    }

                    // Flush post-processors against settled memory.
                    for task in &post_tasks {
                        if let Some(event) = self.post_process(task, "") {
                            yield event;
                        }
                    }
                    tracing::info!(trigger = %transition.trigger, key = %key, "output complete");
                }

                if let Err(err) = self.machine.fire(&transition.trigger) {
                    // Reachable only through an `after` chain whose source
                    // does not match the state we arrived in.
                    tracing::error!(%err, "chained trigger not available, stopping");
                    return;
                }
                yield Event::TransitionCompleted {
                    trigger: transition.trigger.clone(),
                };

                match transition.after.clone() {
                    Some(after) => match after.strip_prefix("memory_key:") {
                        Some(memory_key) => {
                            let next = self
                                .memory
                                .get(memory_key)
                                .and_then(|value| value.as_str())
                                .map(str::to_string);
                            match next.and_then(|trigger| {
                                self.definition.transition_for_trigger(&trigger).cloned()
                            }) {
                                Some(next_transition) => transition = next_transition,
                                None => {
                                    tracing::error!(memory_key = %memory_key, "memory key not found");
                                    break;
                                }
                            }
                        }
                        None => {
                            // Validated at construction: `after` is a trigger.
                            match self.definition.transition_for_trigger(&after).cloned() {
                                Some(next_transition) => transition = next_transition,
                                None => break,
                            }
                        }
                    },
                    None => break,
                }
            }

            yield self.machine_update(&transition, false, None);
        }
    }

    /// Subset of memory named by the transition's declared input keys.
    fn transition_inputs(&self, transition: &crate::definition::Transition) -> Value {
        let mut inputs = Map::new();
        for input in &transition.inputs {
            inputs.insert(
                input.key.clone(),
                self.memory.get_or(&input.key, Value::Null),
            );
        }
        Value::Object(inputs)
    }

    /// Resolve a loop binding to its concrete item list: a literal list is
    /// used as-is, anything else names a memory key holding a list.
    fn resolve_loop_items(&self, binding: &Value) -> Vec<Value> {
        match binding {
            Value::Array(items) => items.clone(),
            Value::String(memory_key) => self
                .memory
                .get(memory_key)
                .and_then(|value| value.as_array())
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}
