//! Structural invariants enforced at construction.
//!
//! Every violation names the offending key so authors can fix documents
//! without reading runtime traces.

use crate::definition::{DefinitionError, SynthDefinition};

pub(crate) fn validate(definition: &SynthDefinition) -> Result<(), DefinitionError> {
    let state_names = definition.state_names();
    let triggers = definition.trigger_names();

    if !state_names.contains(&definition.initial_state) {
        return Err(DefinitionError::UnknownInitialState {
            state: definition.initial_state.clone(),
            available: state_names,
        });
    }

    for transition in &definition.transitions {
        if !state_names.contains(&transition.source) {
            return Err(DefinitionError::UnknownTransitionState {
                trigger: transition.trigger.clone(),
                field: "source",
                state: transition.source.clone(),
            });
        }
        if !state_names.contains(&transition.dest) {
            return Err(DefinitionError::UnknownTransitionState {
                trigger: transition.trigger.clone(),
                field: "dest",
                state: transition.dest.clone(),
            });
        }

        if let Some(after) = &transition.after {
            if !after.starts_with("memory_key:") && !triggers.contains(after) {
                return Err(DefinitionError::UnknownAfterTrigger {
                    after: after.clone(),
                    available: triggers,
                });
            }
        }

        for output in &transition.outputs {
            if (output.prompt.is_some() || output.system_prompt.is_some())
                && output.schema.is_none()
            {
                return Err(DefinitionError::MissingSchema {
                    key: output.key.clone(),
                });
            }
            if output.tool.is_some() && output.route.is_none() {
                return Err(DefinitionError::MissingRoute {
                    key: output.key.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::definition::{DefinitionError, SynthDefinition};
    use serde_json::json;

    #[test]
    fn rejects_unknown_initial_state() {
        let err = SynthDefinition::from_value(json!({
            "initial_state": "nowhere",
            "states": [{"name": "a"}],
            "transitions": []
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownInitialState { .. }));
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn rejects_unknown_dest_state() {
        let err = SynthDefinition::from_value(json!({
            "initial_state": "a",
            "states": [{"name": "a"}],
            "transitions": [{"trigger": "go", "source": "a", "dest": "ghost"}]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::UnknownTransitionState { field: "dest", .. }
        ));
    }

    #[test]
    fn rejects_after_that_is_no_trigger() {
        let err = SynthDefinition::from_value(json!({
            "initial_state": "a",
            "states": [{"name": "a"}, {"name": "b"}],
            "transitions": [
                {"trigger": "go", "source": "a", "dest": "b", "after": "missing"}
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownAfterTrigger { .. }));
    }

    #[test]
    fn memory_key_after_is_allowed() {
        SynthDefinition::from_value(json!({
            "initial_state": "a",
            "states": [{"name": "a"}, {"name": "b"}],
            "transitions": [
                {"trigger": "go", "source": "a", "dest": "b", "after": "memory_key:next"}
            ]
        }))
        .unwrap();
    }

    #[test]
    fn rejects_schemaless_prompt() {
        let err = SynthDefinition::from_value(json!({
            "initial_state": "a",
            "states": [{"name": "a"}, {"name": "b"}],
            "transitions": [{
                "trigger": "go", "source": "a", "dest": "b",
                "outputs": [{"key": "text", "prompt": "hi"}]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::MissingSchema { .. }));
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn rejects_routeless_tool() {
        let err = SynthDefinition::from_value(json!({
            "initial_state": "a",
            "states": [{"name": "a"}, {"name": "b"}],
            "transitions": [{
                "trigger": "go", "source": "a", "dest": "b",
                "outputs": [{"key": "result", "tool": "search"}]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::MissingRoute { .. }));
    }
}
