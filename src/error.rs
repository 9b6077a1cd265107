//! Unified error type for the runtime.
//!
//! Each layer owns its own `thiserror` enum ([`DefinitionError`],
//! [`TransitionError`], [`TemplateError`], [`SetupError`], [`ToolError`])
//! and this module aggregates them into a single actionable [`Error`].
//!
//! Only two classes of failure surface as `Err` values: definition errors
//! raised at construction, and trigger errors raised when a trigger is not
//! available at the current state. Every runtime failure inside a transition
//! flows through the event channel instead (see [`crate::events::Event`]),
//! so callers can render partial progress before a late failure.

use thiserror::Error;

pub use crate::definition::DefinitionError;
pub use crate::machine::TransitionError;
pub use crate::setup::SetupError;
pub use crate::template::TemplateError;
pub use crate::tool::ToolError;

/// Unified error type for the synth runtime
#[derive(Debug, Error)]
pub enum Error {
    #[error("Pipeline definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Operator setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
