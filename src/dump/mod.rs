//! Serializable snapshots of executions and charts.
//!
//! A [`Dump`] is the persistence-facing view of an execution: the current
//! state path, the completion flag, and one flat row per step across every
//! state of the chart. Adapters write dumps to storage and rebuild
//! executions from them with [`restore`]. A [`ChartDescription`] is the
//! equivalent metadata view of a compiled chart.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::chart::Chart;
use crate::core::state::State;
use crate::execution::callbacks::{Callbacks, Context};
use crate::execution::{Execution, ExecutionError};

/// One step row in a dump, identified by `(state, name)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDump {
    /// Dotted path of the owning state.
    pub state: String,
    /// Order within the owning state.
    pub order: u32,
    /// Step name.
    pub name: String,
    /// Completion status.
    pub complete: bool,
    /// Recorded decision choice, if any.
    pub decision: Option<String>,
    /// Participant role tag, if any.
    pub participant: Option<String>,
}

/// Serializable snapshot of an execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dump {
    /// Chart name.
    pub name: String,
    /// Dotted path of the current state.
    pub state: String,
    /// Whether the current state is a final leaf.
    pub complete: bool,
    /// Participant role tags of the chart.
    pub participants: Vec<String>,
    /// Participant ids resolved through the host callback, keyed by role.
    pub participant_ids: Map<String, Value>,
    /// Context key of the bound subject, if the chart names one.
    pub subject_key: Option<String>,
    /// Step rows across all states: current view for the current state,
    /// newest history snapshot where one exists, pristine chart otherwise.
    pub steps: Vec<StepDump>,
}

/// Snapshot an execution for persistence.
pub fn dump(execution: &Execution) -> Dump {
    let chart = execution.chart();
    let mut steps = Vec::new();

    for pristine in chart.states() {
        let view: &State = if pristine.name == execution.state_name() {
            execution.state()
        } else {
            execution
                .history()
                .find(|s| s.name == pristine.name)
                .unwrap_or(pristine)
        };

        let mut state_steps: Vec<_> = view.steps.iter().chain(view.ignored_steps.iter()).collect();
        state_steps.sort_by_key(|s| s.order);
        for step in state_steps {
            steps.push(StepDump {
                state: view.name.clone(),
                order: step.order,
                name: step.name.clone(),
                complete: step.complete,
                decision: step.decision.clone(),
                participant: step.participant.clone(),
            });
        }
    }

    let mut participant_ids = Map::new();
    for role in chart.participants() {
        if let Some(id) = execution
            .callbacks()
            .participant_id(execution.context(), role)
        {
            participant_ids.insert(role.clone(), id);
        }
    }

    Dump {
        name: chart.name().to_string(),
        state: execution.state_name().to_string(),
        complete: execution.is_complete(),
        participants: chart.participants().to_vec(),
        participant_ids,
        subject_key: chart.subject().map(|s| s.key.clone()),
        steps,
    }
}

/// Rebuild an execution from a dump.
///
/// The current state is re-partitioned against the host's `use_step` filter
/// and completion status from the dump is overlaid; every other state whose
/// dumped completions differ from the pristine chart becomes a history
/// snapshot. No actions are queued and the transition log starts empty.
pub fn restore(
    chart: Arc<Chart>,
    callbacks: Arc<dyn Callbacks>,
    context: Context,
    dump: &Dump,
) -> Result<Execution, ExecutionError> {
    let pristine_current =
        chart
            .state(&dump.state)
            .cloned()
            .ok_or_else(|| ExecutionError::NoState {
                target: dump.state.clone(),
            })?;

    let overlay = |state: &mut State| {
        for row in dump.steps.iter().filter(|s| s.state == state.name) {
            if let Some(step) = state
                .steps
                .iter_mut()
                .chain(state.ignored_steps.iter_mut())
                .find(|s| s.name == row.name)
            {
                step.complete = row.complete;
                step.decision = row.decision.clone();
            }
        }
    };

    let mut current = pristine_current;
    let mut kept = Vec::new();
    let mut ignored = std::mem::take(&mut current.ignored_steps);
    for step in std::mem::take(&mut current.steps) {
        if callbacks.use_step(&step.name, &context) {
            kept.push(step);
        } else {
            ignored.push(step);
        }
    }
    current.steps = kept;
    current.ignored_steps = ignored;
    overlay(&mut current);

    let mut history = Vec::new();
    for pristine in chart.states() {
        if pristine.name == dump.state {
            continue;
        }
        let mut snapshot = pristine.clone();
        overlay(&mut snapshot);
        if snapshot != *pristine {
            history.push(snapshot);
        }
    }

    Ok(Execution::from_parts(
        chart, callbacks, current, history, context,
    ))
}

/// One step row in a chart description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDescription {
    pub name: String,
    pub order: u32,
    pub participant: Option<String>,
    pub repeatable: bool,
}

/// One transition row in a chart description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionDescription {
    /// Display form of the handled event.
    pub event: String,
    /// Resolved target paths, in fallthrough order.
    pub targets: Vec<String>,
    pub reset: bool,
    pub actions: Vec<String>,
}

/// One state row in a chart description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateDescription {
    pub name: String,
    pub kind: String,
    pub initial_child: Option<String>,
    pub steps: Vec<StepDescription>,
    pub transitions: Vec<TransitionDescription>,
    pub entry_actions: Vec<String>,
    pub exit_actions: Vec<String>,
}

/// Serializable metadata view of a compiled chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartDescription {
    pub name: String,
    pub initial_state: String,
    pub subject_key: Option<String>,
    pub participants: Vec<String>,
    pub states: Vec<StateDescription>,
}

/// Describe a compiled chart for hosts that render or validate charts.
pub fn describe(chart: &Chart) -> ChartDescription {
    let states = chart
        .states()
        .map(|state| {
            let mut transitions: Vec<_> = state
                .transitions
                .values()
                .map(|t| TransitionDescription {
                    event: t.event.to_string(),
                    targets: t.targets.clone(),
                    reset: t.reset,
                    actions: t.actions.clone(),
                })
                .collect();
            transitions.sort_by(|a, b| a.event.cmp(&b.event));

            StateDescription {
                name: state.name.clone(),
                kind: match state.kind {
                    crate::core::StateKind::Atomic => "atomic".to_string(),
                    crate::core::StateKind::Compound => "compound".to_string(),
                    crate::core::StateKind::Final => "final".to_string(),
                },
                initial_child: state.initial_child.clone(),
                steps: state
                    .steps
                    .iter()
                    .map(|s| StepDescription {
                        name: s.name.clone(),
                        order: s.order,
                        participant: s.participant.clone(),
                        repeatable: state.is_repeatable(&s.name),
                    })
                    .collect(),
                transitions,
                entry_actions: state.entry_actions.clone(),
                exit_actions: state.exit_actions.clone(),
            }
        })
        .collect();

    ChartDescription {
        name: chart.name().to_string(),
        initial_state: chart.initial_state().to_string(),
        subject_key: chart.subject().map(|s| s.key.clone()),
        participants: chart.participants().to_vec(),
        states,
    }
}
