//! The orchestrator.
//!
//! [`Synth`] owns the parsed definition, the state machine, and memory, and
//! drives transitions as pull-based event streams. Construction goes through
//! [`SynthBuilder`] so collaborators (providers, tools, retriever, object
//! store, moderation, cost tracking, user-defined functions) can be injected
//! without threading a half-dozen optional arguments through every call.

mod dispatch;
mod post_process;
mod runner;
mod state;
mod stream;
mod validation;


pub use state::TransitionError;

use crate::cost::{CostTracker, NoopCostTracker};
use crate::definition::{SynthDefinition, Transition};
use crate::events::Event;
use crate::memory::Memory;
use crate::provider::{Provider, ProviderRegistry};
use crate::rag::Retriever;
use crate::safety::{NoopSafety, SafetyCheck};
use crate::store::{InMemoryStore, ObjectStore};
use crate::tool::Tool;
use crate::udf::UdfRegistry;
use crate::{BoxStream, Error};
use futures::StreamExt;
use serde_json::{Map, Value};
use state::StateMachine;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Default retry budget for schema validation failures.
const DEFAULT_RETRIES: u32 = 3;

/// Streaming pipeline orchestrator. One instance per pipeline run; memory
/// lives as long as the instance.
pub struct Synth {
    pub(crate) definition: SynthDefinition,
    pub(crate) machine: StateMachine,
    pub(crate) memory: Memory,
    /// Post-process buffers, keyed by output key.
    pub(crate) buffers: HashMap<String, String>,
    pub(crate) providers: ProviderRegistry,
    pub(crate) tools: Vec<Tool>,
    pub(crate) retriever: Option<Arc<dyn Retriever>>,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) safety: Arc<dyn SafetyCheck>,
    pub(crate) cost: Arc<dyn CostTracker>,
    pub(crate) udfs: UdfRegistry,
    pub(crate) http: reqwest::Client,
    pub(crate) user: String,
    pub(crate) session_id: String,
    pub(crate) retries: u32,
}

impl Synth {
    /// Start building an orchestrator from a pipeline document. Definition
    /// errors surface here, before any collaborator is wired up.
    pub fn builder(document: Value) -> Result<SynthBuilder, Error> {
        let definition = SynthDefinition::from_value(document)?;
        Ok(SynthBuilder::new(definition))
    }

    /// Build from an already-validated definition.
    pub fn builder_from_definition(definition: SynthDefinition) -> SynthBuilder {
        SynthBuilder::new(definition)
    }

    pub fn current_state(&self) -> &str {
        self.machine.state()
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn definition(&self) -> &SynthDefinition {
        &self.definition
    }

    /// Transitions whose trigger is available at `state` (default: the
    /// current state), in declaration order.
    pub fn available(&self, state: Option<&str>) -> Vec<Transition> {
        let state = state.unwrap_or_else(|| self.machine.state());
        let triggers = self.machine.available_triggers(state);
        self.definition
            .transitions
            .iter()
            .filter(|transition| triggers.contains(&transition.trigger.as_str()))
            .cloned()
            .collect()
    }

    /// Drive one trigger (and any `after` chain) as a lazy event stream.
    ///
    /// The caller pulls at its own pace; dropping the stream cancels the
    /// in-flight provider stream or HTTP call. Fails synchronously when the
    /// trigger is unknown or not available at the current state.
    pub fn streaming_trigger(
        &mut self,
        trigger: &str,
        params: Option<Value>,
    ) -> Result<BoxStream<'_, Event>, Error> {
        if self.definition.transition_for_trigger(trigger).is_none()
            || !self.machine.can_fire(trigger)
        {
            return Err(TransitionError {
                trigger: trigger.to_string(),
                state: self.machine.state().to_string(),
            }
            .into());
        }
        if let Some(params) = params {
            self.memory.merge(params);
        }
        Ok(Box::pin(self.run_transitions(trigger.to_string())))
    }

    /// Convenience wrapper: drain the event stream and return
    /// `{output_key: memory[output_key]}` for the invoked transition.
    pub async fn trigger(&mut self, trigger: &str, params: Option<Value>) -> Result<Value, Error> {
        let output_keys: Vec<String> = self
            .definition
            .transition_for_trigger(trigger)
            .map(|transition| {
                transition
                    .outputs
                    .iter()
                    .map(|output| output.key.clone())
                    .collect()
            })
            .unwrap_or_default();

        {
            let mut events = self.streaming_trigger(trigger, params)?;
            while let Some(event) = events.next().await {
                if let Event::Failed { key, reason } = &event {
                    tracing::error!(key = %key, reason = %reason, "output failed");
                } else {
                    tracing::debug!(?event);
                }
            }
        }

        let mut outputs = Map::new();
        for key in output_keys {
            outputs.insert(key.clone(), self.memory.get_or(&key, Value::Null));
        }
        Ok(Value::Object(outputs))
    }

    /// Interface update for the state a transition is heading toward.
    pub(crate) fn machine_update(
        &self,
        transition: &Transition,
        set_active_trigger: bool,
        state: Option<&str>,
    ) -> Event {
        let state = state.unwrap_or(transition.dest.as_str());
        Event::MachineUpdate {
            transitions: self.available(Some(state)),
            memory: self.memory.snapshot(),
            state: self.machine.state().to_string(),
            active_trigger: if set_active_trigger {
                transition.trigger.clone()
            } else {
                String::new()
            },
        }
    }
}

/// Builder for [`Synth`].
pub struct SynthBuilder {
    definition: SynthDefinition,
    memory: Value,
    providers: ProviderRegistry,
    tools: Vec<Tool>,
    retriever: Option<Arc<dyn Retriever>>,
    store: Arc<dyn ObjectStore>,
    safety: Arc<dyn SafetyCheck>,
    cost: Arc<dyn CostTracker>,
    udfs: UdfRegistry,
    user: Option<String>,
    session_id: Option<String>,
    retries: u32,
}

impl SynthBuilder {
    fn new(definition: SynthDefinition) -> Self {
        Self {
            definition,
            memory: Value::Object(Map::new()),
            providers: ProviderRegistry::with_defaults(),
            tools: Vec::new(),
            retriever: None,
            store: Arc::new(InMemoryStore::new()),
            safety: Arc::new(NoopSafety),
            cost: Arc::new(NoopCostTracker),
            udfs: UdfRegistry::new(),
            user: None,
            session_id: None,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Seed memory on top of the definition's `initial_memory`.
    pub fn memory(mut self, memory: Value) -> Self {
        self.memory = memory;
        self
    }

    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.providers.register(name, provider);
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = store;
        self
    }

    pub fn safety(mut self, safety: Arc<dyn SafetyCheck>) -> Self {
        self.safety = safety;
        self
    }

    pub fn cost(mut self, cost: Arc<dyn CostTracker>) -> Self {
        self.cost = cost;
        self
    }

    pub fn udfs(mut self, udfs: UdfRegistry) -> Self {
        self.udfs = udfs;
        self
    }

    pub fn udf<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Memory) -> Value + Send + Sync + 'static,
    {
        self.udfs.register(name, function);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Retry budget for schema validation failures (default 3).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn build(self) -> Synth {
        if !self.udfs.is_empty() {
            tracing::warn!("user defined functions run in-process at the caller's risk");
        }

        let mut memory = Memory::from_value(Value::Object(self.definition.initial_memory.clone()));
        memory.merge(self.memory);

        let machine = StateMachine::new(
            self.definition.initial_state.clone(),
            self.definition
                .transitions
                .iter()
                .map(|t| (t.trigger.clone(), t.source.clone(), t.dest.clone()))
                .collect(),
        );

        Synth {
            definition: self.definition,
            machine,
            memory,
            buffers: HashMap::new(),
            providers: self.providers,
            tools: self.tools,
            retriever: self.retriever,
            store: self.store,
            safety: self.safety,
            cost: self.cost,
            udfs: self.udfs,
            http: reqwest::Client::new(),
            user: self.user.unwrap_or_else(|| Uuid::new_v4().to_string()),
            session_id: self.session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            retries: self.retries,
        }
    }
}
