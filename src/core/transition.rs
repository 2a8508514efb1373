//! Compiled transitions: an event handler attached to a state.

use serde::{Deserialize, Serialize};

use crate::core::event::Event;

/// A compiled transition on a state.
///
/// Targets are absolute dotted paths, fully resolved by the builder. A
/// single-element list is an ordinary transition; a longer list is an
/// ordered fallthrough where the first target that exists and passes the
/// host guard wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Event this transition handles (exact match).
    pub event: Event,
    /// Resolved target paths, tried in order.
    pub targets: Vec<String>,
    /// Whether a self-targeted transition re-enters the state and resets
    /// its steps. When false, only the transition's actions are queued.
    pub reset: bool,
    /// Action tags queued between the exit and entry actions.
    pub actions: Vec<String>,
}

impl Transition {
    /// Create a transition with default policy (`reset: true`, no actions).
    pub fn new(event: Event, targets: Vec<String>) -> Self {
        Self {
            event,
            targets,
            reset: true,
            actions: Vec::new(),
        }
    }

    /// The sole target, when this is not a fallthrough list.
    pub fn single_target(&self) -> Option<&str> {
        match self.targets.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Whether this transition carries an ordered fallthrough list.
    pub fn is_fallthrough(&self) -> bool {
        self.targets.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reset_and_no_actions() {
        let t = Transition::new(Event::named("send"), vec!["sent".into()]);
        assert!(t.reset);
        assert!(t.actions.is_empty());
    }

    #[test]
    fn single_target_only_for_one_element() {
        let one = Transition::new(Event::Null, vec!["a".into()]);
        let many = Transition::new(Event::Null, vec!["a".into(), "b".into()]);

        assert_eq!(one.single_target(), Some("a"));
        assert!(one.single_target().is_some());
        assert!(many.single_target().is_none());
        assert!(many.is_fallthrough());
        assert!(!one.is_fallthrough());
    }
}
