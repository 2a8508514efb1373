//! The immutable compiled chart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::state::{parent_path, State};

/// Binding of a chart to the host entity it drives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubjectBinding {
    /// Context key under which the subject travels.
    pub key: String,
    /// Host-side type name of the subject.
    pub kind: String,
}

/// An immutable compiled statechart.
///
/// Charts are produced by [`ChartBuilder`](crate::builder::ChartBuilder),
/// with every transition target resolved to an absolute dotted path. A chart
/// is constructed once and shared read-only (typically behind an `Arc`) by
/// every execution that runs against it.
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    pub(crate) name: String,
    pub(crate) subject: Option<SubjectBinding>,
    pub(crate) initial_state: String,
    pub(crate) states: BTreeMap<String, State>,
    pub(crate) participants: Vec<String>,
}

impl Chart {
    /// The chart's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subject binding, when the chart is attached to a host entity.
    pub fn subject(&self) -> Option<&SubjectBinding> {
        self.subject.as_ref()
    }

    /// Absolute path of the state entered by a fresh execution.
    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    /// Look up a state by absolute dotted path.
    pub fn state(&self, path: &str) -> Option<&State> {
        self.states.get(path)
    }

    /// Whether the chart contains a state at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.states.contains_key(path)
    }

    /// The parent of a state, derived from its dotted path.
    pub fn parent_of(&self, state: &State) -> Option<&State> {
        parent_path(&state.name).and_then(|p| self.states.get(p))
    }

    /// All states, ordered by path.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// All state paths, ordered.
    pub fn state_paths(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// Participant role tags, in declaration order.
    pub fn participants(&self) -> &[String] {
        &self.participants
    }
}
