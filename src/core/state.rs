//! State nodes of a compiled chart.
//!
//! States are keyed by dot-separated paths (`"pending.sending"`); the path
//! encodes the hierarchy, so parent/sibling relationships are derived from
//! the name alone. Atomic states carry the checklist; compound states carry
//! children through their `initial_child`; final states terminate the
//! workflow and raise the synthetic `Final` event on entry.

use std::collections::{BTreeSet, HashMap};

use crate::core::event::Event;
use crate::core::step::Step;
use crate::core::transition::Transition;

/// The role of a state within the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateKind {
    /// Leaf with an optional checklist of steps.
    Atomic,
    /// Branch node; entering it descends into `initial_child`.
    Compound,
    /// Terminal leaf; entering it raises the synthetic `Final` event.
    Final,
}

/// A node in the chart hierarchy.
///
/// Executions hold fresh copies of chart states: the copy's `steps` are
/// re-partitioned against the host's `use_step` filter on entry, and
/// completion status accumulates on the copy, never on the chart.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    /// Dot-separated path, unique within the chart.
    pub name: String,
    /// Atomic, compound or final.
    pub kind: StateKind,
    /// Absolute path of the child entered on descent (compound only).
    pub initial_child: Option<String>,
    /// Checklist surviving the host's `use_step` filter.
    pub steps: Vec<Step>,
    /// Steps hidden by the host's `use_step` filter.
    pub ignored_steps: Vec<Step>,
    /// Names of steps that may be re-completed idempotently.
    pub repeatable_steps: BTreeSet<String>,
    /// Transition table, keyed by exact event.
    pub transitions: HashMap<Event, Transition>,
    /// Action tags queued when the state is entered.
    pub entry_actions: Vec<String>,
    /// Action tags queued when the state is left.
    pub exit_actions: Vec<String>,
}

impl State {
    /// Create an empty state of the given kind.
    pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_child: None,
            steps: Vec::new(),
            ignored_steps: Vec::new(),
            repeatable_steps: BTreeSet::new(),
            transitions: HashMap::new(),
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
        }
    }

    /// Whether this state is a terminal leaf.
    pub fn is_final(&self) -> bool {
        self.kind == StateKind::Final
    }

    /// Whether this state is an atomic leaf.
    pub fn is_atomic(&self) -> bool {
        self.kind == StateKind::Atomic
    }

    /// Whether this state is a compound branch.
    pub fn is_compound(&self) -> bool {
        self.kind == StateKind::Compound
    }

    /// Exact-match lookup in the transition table.
    pub fn transition_for(&self, event: &Event) -> Option<&Transition> {
        self.transitions.get(event)
    }

    /// Find a step by name across the kept and ignored lists.
    pub fn find_step(&self, name: &str) -> Option<&Step> {
        self.steps
            .iter()
            .chain(self.ignored_steps.iter())
            .find(|s| s.name == name)
    }

    /// Mutable lookup in the kept step list only.
    pub fn find_step_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    /// Whether the named step may be re-completed idempotently.
    pub fn is_repeatable(&self, name: &str) -> bool {
        self.repeatable_steps.contains(name)
    }

    /// The lowest-order group among incomplete steps: the set of steps that
    /// may be completed next. Empty when every step is complete.
    pub fn next_step_group(&self) -> Vec<&Step> {
        let lowest = self
            .steps
            .iter()
            .filter(|s| !s.complete)
            .map(|s| s.order)
            .min();
        match lowest {
            Some(order) => self
                .steps
                .iter()
                .filter(|s| !s.complete && s.order == order)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Names of the next completable steps, in declaration order.
    pub fn next_step_names(&self) -> Vec<String> {
        self.next_step_group()
            .into_iter()
            .map(|s| s.name.clone())
            .collect()
    }
}

/// The path of a state's parent, or `None` for a root state.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind('.').map(|i| &path[..i])
}

/// The last segment of a dotted path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Whether `child` is a direct child of `parent`.
pub fn is_child_of(child: &str, parent: &str) -> bool {
    parent_path(child) == Some(parent)
}

/// Whether two distinct paths share a parent (both roots count).
pub fn is_sibling_of(a: &str, b: &str) -> bool {
    a != b && parent_path(a) == parent_path(b)
}
