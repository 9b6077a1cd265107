//! # synth-runtime
//!
//! Streaming runtime for declarative LLM pipelines.
//!
//! A pipeline is a finite-state machine described by a JSON (or YAML)
//! document. Each transition produces a set of *outputs*; each output is
//! computed by exactly one operation (LLM prompt, tool call, template
//! render, list append/interleave/reset, retrieval query, or user-defined
//! function). Prompt outputs stream token-by-token while being validated
//! against a JSON Schema, retried on schema failure, post-processed with a
//! jq-style transform, and committed to a shared memory map that later
//! transitions read from.
//!
//! The runtime owns orchestration only. Vendor HTTP shims, moderation
//! services, object stores, and retrievers are injected through the traits
//! in [`provider`], [`safety`], [`store`], and [`rag`].
//!
//! ## Quick start
//!
//! ```no_run
//! use synth_runtime::Synth;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), synth_runtime::Error> {
//! let definition = json!({
//!     "initial_state": "start",
//!     "states": [{"name": "start"}, {"name": "done"}],
//!     "transitions": [{
//!         "trigger": "greet",
//!         "source": "start",
//!         "dest": "done",
//!         "outputs": [{
//!             "key": "greeting",
//!             "prompt": "Say hello",
//!             "schema": {"type": "string"}
//!         }]
//!     }]
//! });
//!
//! let mut synth = Synth::builder(definition)?.build();
//! let outputs = synth.trigger("greet", None).await?;
//! println!("{}", outputs["greeting"]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cost;
pub mod definition;
pub mod events;
pub mod jq;
pub mod machine;
pub mod memory;
pub mod partial_json;
pub mod provider;
pub mod rag;
pub mod safety;
pub mod setup;
pub mod store;
pub mod template;
pub mod tool;
pub mod udf;

// Re-export main types for convenience
pub use config::{ModelConfig, ModelConfigOverlay, RagConfig};
pub use definition::{Output, State, SynthDefinition, Transition};
pub use events::{Event, SafetyStage, TokenStage};
pub use machine::{Synth, SynthBuilder, TransitionError};
pub use memory::Memory;
pub use provider::{Provider, ProviderRegistry, TokenEvent};
pub use tool::Tool;

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of `T`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::Error;
