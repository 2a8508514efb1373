//! Query predicates over persisted workflows.
//!
//! Hosts select subjects by workflow position using these predicates; the
//! dotted state path is the wire form. SQL adapters translate them to
//! `WHERE` clauses (`state = ?`, `state IN (…)`,
//! `state = ? OR state LIKE ? || '.%'`, a join on completed step name); the
//! in-memory repository evaluates them directly via [`matches`].
//!
//! [`matches`]: WorkflowFilter::matches

use crate::persistence::WorkflowRecord;

/// A predicate over a persisted workflow record.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowFilter {
    /// The workflow is exactly in this state.
    StateEquals(String),
    /// The workflow is in one of these states.
    StateIn(Vec<String>),
    /// The workflow is in `prefix` or any state below it (`prefix.…`).
    StateHasPrefix(String),
    /// The named step is complete in any state.
    StepComplete(String),
}

impl WorkflowFilter {
    /// The workflow is exactly in this state.
    pub fn state_equals(state: impl Into<String>) -> Self {
        Self::StateEquals(state.into())
    }

    /// The workflow is in one of these states.
    pub fn state_in(states: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::StateIn(states.into_iter().map(Into::into).collect())
    }

    /// The workflow is in `prefix` or any descendant state.
    pub fn state_has_prefix(prefix: impl Into<String>) -> Self {
        Self::StateHasPrefix(prefix.into())
    }

    /// The named step is complete.
    pub fn step_complete(name: impl Into<String>) -> Self {
        Self::StepComplete(name.into())
    }

    /// Evaluate the predicate against a record.
    pub fn matches(&self, record: &WorkflowRecord) -> bool {
        match self {
            Self::StateEquals(state) => record.state == *state,
            Self::StateIn(states) => states.contains(&record.state),
            Self::StateHasPrefix(prefix) => {
                record.state == *prefix
                    || (record.state.len() > prefix.len()
                        && record.state.starts_with(prefix.as_str())
                        && record.state.as_bytes()[prefix.len()] == b'.')
            }
            Self::StepComplete(name) => {
                record.steps.iter().any(|s| s.name == *name && s.complete)
            }
        }
    }
}
