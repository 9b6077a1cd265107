//! Minimal finite-state machine backing the orchestrator.
//!
//! Only what the runtime needs: a declared transition table, no
//! auto-transitions, trigger availability by state, and a forced state
//! setter used when a validation failure rewinds a transition.

use thiserror::Error;

/// Raised when a trigger is not available at the current state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("No transition: {trigger} exists at state: {state}")]
pub struct TransitionError {
    pub trigger: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub(crate) struct StateMachine {
    current: String,
    /// `(trigger, source, dest)` tuples in declaration order.
    transitions: Vec<(String, String, String)>,
}

impl StateMachine {
    pub(crate) fn new(initial: String, transitions: Vec<(String, String, String)>) -> Self {
        Self {
            current: initial,
            transitions,
        }
    }

    pub(crate) fn state(&self) -> &str {
        &self.current
    }

    pub(crate) fn available_triggers(&self, state: &str) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|(_, source, _)| source == state)
            .map(|(trigger, _, _)| trigger.as_str())
            .collect()
    }

    pub(crate) fn can_fire(&self, trigger: &str) -> bool {
        self.transitions
            .iter()
            .any(|(t, source, _)| t == trigger && *source == self.current)
    }

    pub(crate) fn fire(&mut self, trigger: &str) -> Result<(), TransitionError> {
        let dest = self
            .transitions
            .iter()
            .find(|(t, source, _)| t == trigger && *source == self.current)
            .map(|(_, _, dest)| dest.clone())
            .ok_or_else(|| TransitionError {
                trigger: trigger.to_string(),
                state: self.current.clone(),
            })?;
        self.current = dest;
        Ok(())
    }

    /// Force the machine into `state` without firing a transition. Used to
    /// rewind after a validation failure.
    pub(crate) fn force(&mut self, state: &str) {
        self.current = state.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine {
        StateMachine::new(
            "a".to_string(),
            vec![
                ("go".to_string(), "a".to_string(), "b".to_string()),
                ("back".to_string(), "b".to_string(), "a".to_string()),
            ],
        )
    }

    #[test]
    fn fire_moves_to_dest() {
        let mut m = machine();
        m.fire("go").unwrap();
        assert_eq!(m.state(), "b");
        m.fire("back").unwrap();
        assert_eq!(m.state(), "a");
    }

    #[test]
    fn unavailable_trigger_errors() {
        let mut m = machine();
        let err = m.fire("back").unwrap_err();
        assert_eq!(err.trigger, "back");
        assert_eq!(err.state, "a");
        assert_eq!(m.state(), "a");
    }

    #[test]
    fn availability_by_state() {
        let m = machine();
        assert_eq!(m.available_triggers("a"), ["go"]);
        assert_eq!(m.available_triggers("b"), ["back"]);
        assert!(m.can_fire("go"));
        assert!(!m.can_fire("back"));
    }

    #[test]
    fn force_sets_state_directly() {
        let mut m = machine();
        m.fire("go").unwrap();
        m.force("a");
        assert_eq!(m.state(), "a");
    }
}
