//! Interpreter error kinds.

use thiserror::Error;

use crate::core::event::Event;

fn next_steps_message(next_steps: &[String]) -> String {
    match next_steps {
        [] => "no steps remain to complete".to_string(),
        [only] => format!("next step is: {only}"),
        many => format!("next steps are: {}", many.join(", ")),
    }
}

/// Errors surfaced by the interpreter.
///
/// Every failing call leaves the execution unchanged; callers may amend the
/// context and retry. `NoState` indicates a malformed chart and cannot occur
/// for charts produced by the builder.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// No handler for the event along the parent chain, reported against
    /// the state the dispatch started from.
    #[error("no transition for `{event}` from `{from}`")]
    NoTransition { from: String, event: Event },

    /// A transition points at a state the chart does not contain.
    #[error("transition target `{target}` does not exist")]
    NoState { target: String },

    /// The host guard vetoed the transition.
    #[error("guard rejected transition: {reason}")]
    GuardRejected { reason: String },

    /// Completion attempted for a step outside the next completable group.
    #[error("{}", next_steps_message(.next_steps))]
    StepOutOfOrder { next_steps: Vec<String> },

    /// Completion attempted for a step the current state does not carry.
    #[error("unknown step `{name}`")]
    UnknownStep { name: String },

    /// The action drain hit a tag the host does not implement.
    #[error("no action handler for `{tag}`")]
    UnknownAction { tag: String },

    /// The host action reported a failure while draining.
    #[error("action `{tag}` failed: {reason}")]
    ActionFailed { tag: String, reason: String },
}
