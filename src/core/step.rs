//! Checklist steps attached to atomic states.
//!
//! Steps are the work items of a workflow: ordered, optionally owned by a
//! participant, and completed one group at a time. Steps sharing an order
//! value form a parallel group and may be completed in any order within it.

use serde::{Deserialize, Serialize};

/// A single checklist item inside an atomic state.
///
/// Identity within a state is the step's `name`. The `order` value places
/// the step in the state's completion sequence; ties denote parallel steps.
///
/// # Example
///
/// ```rust
/// use waymark::core::Step;
///
/// let step = Step::new("collect_signature", 1);
/// assert_eq!(step.name, "collect_signature");
/// assert!(!step.complete);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within its state.
    pub name: String,
    /// Role tag of the party expected to complete the step, if any.
    pub participant: Option<String>,
    /// Position in the state's checklist; ties denote parallel steps.
    pub order: u32,
    /// Whether the step has been completed.
    pub complete: bool,
    /// Choice recorded when the step was completed through a decision event.
    pub decision: Option<String>,
}

impl Step {
    /// Create an incomplete step with the given name and order.
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self {
            name: name.into(),
            participant: None,
            order,
            complete: false,
            decision: None,
        }
    }

    /// Attach a participant role tag.
    pub fn with_participant(mut self, participant: impl Into<String>) -> Self {
        self.participant = Some(participant.into());
        self
    }

    /// Whether this step shares an order group with `other`.
    pub fn is_parallel_with(&self, other: &Step) -> bool {
        self.order == other.order
    }
}
