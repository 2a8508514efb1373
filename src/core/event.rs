//! Event vocabulary of the interpreter.
//!
//! Transition tables are keyed by exact event match: a handler for
//! `Completed("close")` only fires for that step, never for a pattern.
//! Three reserved events are raised by the interpreter itself on state
//! entry and never dispatched by hosts directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An event dispatched against an execution.
///
/// `Null`, `Final` and `NoSteps` are synthetic: the interpreter raises them
/// while entering a state (in that fixed order on the innermost leaf) and
/// silently drops them when no handler exists along the parent chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// An arbitrary named event dispatched by the host.
    Named(String),
    /// A step was completed.
    Completed(String),
    /// A decision was recorded on a step.
    Decision(String, String),
    /// Raised on every leaf entry; drives dynamic initial routing.
    Null,
    /// Raised on entering a final leaf.
    Final,
    /// Raised on entering an atomic leaf whose surviving step list is empty.
    NoSteps,
}

impl Event {
    /// A host-named event.
    pub fn named(tag: impl Into<String>) -> Self {
        Self::Named(tag.into())
    }

    /// The completion event for a step.
    pub fn completed(step: impl Into<String>) -> Self {
        Self::Completed(step.into())
    }

    /// The decision event for a step and choice.
    pub fn decision(step: impl Into<String>, choice: impl Into<String>) -> Self {
        Self::Decision(step.into(), choice.into())
    }

    /// Whether this event is one of the reserved synthetic events.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Null | Self::Final | Self::NoSteps)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tag) => write!(f, "{tag}"),
            Self::Completed(step) => write!(f, "completed:{step}"),
            Self::Decision(step, choice) => write!(f, "decision:{step}:{choice}"),
            Self::Null => write!(f, "(null)"),
            Self::Final => write!(f, "(final)"),
            Self::NoSteps => write!(f, "(no-steps)"),
        }
    }
}
