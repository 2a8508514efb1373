//! The execution interpreter.
//!
//! An [`Execution`] runs one workflow instance against a shared, immutable
//! [`Chart`]. Events are dispatched with exact-match lookup and bubble up
//! the parent chain; entering a state queues exit, transition and entry
//! actions in order and descends into compound initial children; the
//! synthetic `Final`, `Null` and `NoSteps` events fire on the innermost
//! leaf, in that order.
//!
//! Every public operation is atomic: it either succeeds and commits, or
//! returns an error with the execution unchanged. Mutation is staged on a
//! clone and swapped in on success.

pub mod actions;
pub mod callbacks;
pub mod error;

pub use actions::ActionDrain;
pub use callbacks::{ActionOutcome, Callbacks, Context, NoopCallbacks};
pub use error::ExecutionError;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::chart::Chart;
use crate::core::event::Event;
use crate::core::state::{is_child_of, parent_path, State};
use crate::core::transition::Transition;

/// Per-entry switches for the action queue, all on by default.
///
/// Hosts replaying persisted work may dispatch with some classes of actions
/// suppressed via [`Execution::transition_with`].
#[derive(Clone, Copy, Debug)]
pub struct EntryOpts {
    /// Queue exit actions of the state being left.
    pub exit_actions: bool,
    /// Queue the triggering transition's actions.
    pub transition_actions: bool,
    /// Queue entry actions of the states being entered.
    pub entry_actions: bool,
}

impl Default for EntryOpts {
    fn default() -> Self {
        Self {
            exit_actions: true,
            transition_actions: true,
            entry_actions: true,
        }
    }
}

/// A mutable workflow interpreter over an immutable chart.
///
/// The execution owns its current state, history, action queue and context;
/// the chart is shared read-only. History snapshots are copies of states
/// with completion status overlaid, never aliases into the chart.
#[derive(Clone)]
pub struct Execution {
    chart: Arc<Chart>,
    callbacks: Arc<dyn Callbacks>,
    state: State,
    history: Vec<State>,
    transitions_log: Vec<Transition>,
    actions: Vec<String>,
    context: Context,
    meta: Context,
}

impl Execution {
    /// Start a fresh execution in the chart's initial state.
    ///
    /// Entry actions of the initial state (and any descent chain) are
    /// queued; synthetic events raised on entry resolve before this
    /// returns.
    pub fn new(
        chart: Arc<Chart>,
        callbacks: Arc<dyn Callbacks>,
        context: Context,
    ) -> Result<Self, ExecutionError> {
        let initial = chart.initial_state().to_string();
        let seed = chart
            .state(&initial)
            .cloned()
            .ok_or_else(|| ExecutionError::NoState {
                target: initial.clone(),
            })?;
        let mut execution = Self {
            chart,
            callbacks,
            state: seed,
            history: Vec::new(),
            transitions_log: Vec::new(),
            actions: Vec::new(),
            context,
            meta: Context::new(),
        };
        execution.enter(&initial, None, None, EntryOpts::default())?;
        Ok(execution)
    }

    /// Rebuild an execution from restored parts; used by dump restore.
    pub(crate) fn from_parts(
        chart: Arc<Chart>,
        callbacks: Arc<dyn Callbacks>,
        state: State,
        history: Vec<State>,
        context: Context,
    ) -> Self {
        Self {
            chart,
            callbacks,
            state,
            history,
            transitions_log: Vec::new(),
            actions: Vec::new(),
            context,
            meta: Context::new(),
        }
    }

    /// The chart this execution runs against.
    pub fn chart(&self) -> &Arc<Chart> {
        &self.chart
    }

    /// The current state (a filtered copy owned by this execution).
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Dotted path of the current state.
    pub fn state_name(&self) -> &str {
        &self.state.name
    }

    /// Whether the workflow has reached a final leaf.
    pub fn is_complete(&self) -> bool {
        self.state.is_final()
    }

    /// Prior state snapshots, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &State> {
        self.history.iter().rev()
    }

    /// Transitions taken, most recent first.
    pub fn transitions_log(&self) -> impl Iterator<Item = &Transition> {
        self.transitions_log.iter().rev()
    }

    /// Action tags queued and not yet drained, in execution order.
    pub fn queued_actions(&self) -> &[String] {
        &self.actions
    }

    /// The host-managed context mapping.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable access to the host-managed context mapping.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The bound subject value from the context, when the chart names one.
    pub fn subject(&self) -> Option<&serde_json::Value> {
        self.chart
            .subject()
            .and_then(|binding| self.context.get(&binding.key))
    }

    /// Adapter scratch space; never touched by the interpreter.
    pub fn meta(&self) -> &Context {
        &self.meta
    }

    /// Mutable access to the adapter scratch space.
    pub fn meta_mut(&mut self) -> &mut Context {
        &mut self.meta
    }

    /// Dispatch an event against the current state.
    pub fn transition(&mut self, event: &Event) -> Result<(), ExecutionError> {
        self.transition_with(event, EntryOpts::default())
    }

    /// Dispatch an event with explicit entry options.
    pub fn transition_with(
        &mut self,
        event: &Event,
        opts: EntryOpts,
    ) -> Result<(), ExecutionError> {
        let mut staged = self.clone();
        staged.dispatch(event, opts)?;
        *self = staged;
        Ok(())
    }

    /// Complete a step in the current state.
    ///
    /// On acceptance the synthetic `Completed` event is dispatched; a
    /// missing handler is not an error, the completion stands and the state
    /// is unchanged.
    pub fn complete(&mut self, step: &str) -> Result<(), ExecutionError> {
        let mut staged = self.clone();
        staged.apply_completion(step, None)?;
        *self = staged;
        Ok(())
    }

    /// Complete a step recording a decision choice.
    ///
    /// Dispatches the synthetic `Decision` event; unlike [`complete`],
    /// a missing handler is surfaced as `NoTransition` and the whole call
    /// rolls back.
    ///
    /// [`complete`]: Execution::complete
    pub fn decision(&mut self, step: &str, choice: &str) -> Result<(), ExecutionError> {
        let mut staged = self.clone();
        staged.apply_completion(step, Some(choice))?;
        *self = staged;
        Ok(())
    }

    /// Queue one action tag at the back of the drain order.
    pub(crate) fn queue_action(&mut self, tag: String) {
        self.actions.push(tag);
    }

    pub(crate) fn callbacks(&self) -> &Arc<dyn Callbacks> {
        &self.callbacks
    }

    pub(crate) fn take_queued_actions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.actions)
    }

    pub(crate) fn requeue_actions(&mut self, remaining: Vec<String>) {
        self.actions = remaining;
    }

    pub(crate) fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    fn apply_completion(&mut self, name: &str, choice: Option<&str>) -> Result<(), ExecutionError> {
        if self.state.find_step(name).is_none() {
            return Err(ExecutionError::UnknownStep { name: name.into() });
        }

        let next = self.state.next_step_names();
        let in_next_group = next.iter().any(|n| n == name);

        if !in_next_group {
            let already_complete = self
                .state
                .find_step(name)
                .map(|s| s.complete)
                .unwrap_or(false);
            if self.state.is_repeatable(name) && (already_complete || next.is_empty()) {
                debug!(state = %self.state.name, step = %name, "repeatable re-completion, no change");
                return Ok(());
            }
            return Err(ExecutionError::StepOutOfOrder { next_steps: next });
        }

        if let Some(step) = self.state.find_step_mut(name) {
            step.complete = true;
            if let Some(choice) = choice {
                step.decision = Some(choice.to_string());
            }
        }
        debug!(state = %self.state.name, step = %name, decision = choice.unwrap_or(""), "step completed");

        let event = match choice {
            Some(choice) => Event::decision(name, choice),
            None => Event::completed(name),
        };
        match self.dispatch(&event, EntryOpts::default()) {
            Ok(()) => Ok(()),
            Err(ExecutionError::NoTransition { .. }) if choice.is_none() => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Walk the parent chain for an exact-match handler. Returns the owning
    /// state's path alongside the transition: a bubbled no-reset self
    /// transition is judged against its owner, not the originating leaf.
    fn find_transition(&self, event: &Event) -> Option<(String, Transition)> {
        let mut node = Some(&self.state);
        while let Some(state) = node {
            if let Some(transition) = state.transition_for(event) {
                return Some((state.name.clone(), transition.clone()));
            }
            node = parent_path(&state.name).and_then(|p| self.chart.state(p));
        }
        None
    }

    fn dispatch(&mut self, event: &Event, opts: EntryOpts) -> Result<(), ExecutionError> {
        let origin = self.state.name.clone();
        let (owner, transition) =
            self.find_transition(event)
                .ok_or_else(|| ExecutionError::NoTransition {
                    from: origin.clone(),
                    event: event.clone(),
                })?;
        debug!(state = %origin, owner = %owner, event = %event, "resolved transition");

        if let Some(target) = transition.single_target() {
            if target == owner && !transition.reset {
                for tag in &transition.actions {
                    self.queue_action(tag.clone());
                }
                return Ok(());
            }
        }

        match transition.targets.as_slice() {
            [] => Err(ExecutionError::NoTransition {
                from: origin,
                event: event.clone(),
            }),
            [only] => {
                let target = only.clone();
                self.take_target(&transition, &owner, &target, opts)
            }
            _ => {
                for target in transition.targets.clone() {
                    match self.take_target(&transition, &owner, &target, opts) {
                        Ok(()) => return Ok(()),
                        Err(ExecutionError::GuardRejected { .. })
                        | Err(ExecutionError::NoState { .. }) => continue,
                        Err(other) => return Err(other),
                    }
                }
                // exhausted fallthrough reports the originating miss
                Err(ExecutionError::NoTransition {
                    from: origin,
                    event: event.clone(),
                })
            }
        }
    }

    /// `owner` is the state the handler was found on; guards see it as
    /// `from`, even when the event bubbled up from a descendant leaf.
    fn take_target(
        &mut self,
        transition: &Transition,
        owner: &str,
        target: &str,
        opts: EntryOpts,
    ) -> Result<(), ExecutionError> {
        if !self.chart.contains(target) {
            return Err(ExecutionError::NoState {
                target: target.to_string(),
            });
        }
        self.callbacks
            .guard(owner, target, &self.context)
            .map_err(|reason| {
                debug!(from = %owner, to = %target, reason = %reason, "guard rejected");
                ExecutionError::GuardRejected { reason }
            })?;

        let previous = self.state.name.clone();
        self.transitions_log.push(transition.clone());
        let transition_actions = if opts.transition_actions {
            Some(transition.actions.as_slice())
        } else {
            None
        };
        self.enter(target, transition_actions, Some(&previous), opts)
    }

    /// Enter a state: history push, fresh filtered copy, action queueing,
    /// descent, synthetic raises.
    fn enter(
        &mut self,
        path: &str,
        transition_actions: Option<&[String]>,
        previous: Option<&str>,
        opts: EntryOpts,
    ) -> Result<(), ExecutionError> {
        let target = self
            .chart
            .state(path)
            .cloned()
            .ok_or_else(|| ExecutionError::NoState {
                target: path.to_string(),
            })?;
        debug!(state = %path, "entering state");

        if previous.is_some() {
            self.history.push(self.state.clone());
        }

        let mut fresh = target;
        let mut kept = Vec::new();
        let mut ignored = std::mem::take(&mut fresh.ignored_steps);
        for step in std::mem::take(&mut fresh.steps) {
            if self.callbacks.use_step(&step.name, &self.context) {
                kept.push(step);
            } else {
                ignored.push(step);
            }
        }
        fresh.steps = kept;
        fresh.ignored_steps = ignored;
        self.state = fresh;

        // Exit actions only when leaving sideways: descending into a child
        // and ascending into the own parent queue none.
        if let Some(prev) = previous {
            let descending = is_child_of(path, prev);
            let ascending = is_child_of(prev, path);
            if opts.exit_actions && !descending && !ascending {
                let prev_exits = self
                    .chart
                    .state(prev)
                    .map(|s| s.exit_actions.clone())
                    .unwrap_or_default();
                for tag in prev_exits {
                    self.queue_action(tag);
                }
                if parent_path(prev) != parent_path(path) {
                    if let Some(ancestor) = parent_path(prev) {
                        let ancestor_exits = self
                            .chart
                            .state(ancestor)
                            .map(|s| s.exit_actions.clone())
                            .unwrap_or_default();
                        for tag in ancestor_exits {
                            self.queue_action(tag);
                        }
                    }
                }
            }
        }

        if let Some(tags) = transition_actions {
            for tag in tags {
                self.queue_action(tag.clone());
            }
        }

        if opts.entry_actions {
            for tag in self.state.entry_actions.clone() {
                self.queue_action(tag);
            }
        }

        if self.state.is_compound() {
            if let Some(child) = self.state.initial_child.clone() {
                let here = self.state.name.clone();
                return self.enter(&child, None, Some(&here), opts);
            }
        }

        // synthetic raises on the innermost leaf: Final, Null, NoSteps.
        // A raise that moves the execution ends the chain; the new state
        // already ran its own raises while being entered.
        let here = self.state.name.clone();
        if self.state.is_final() {
            self.raise(&Event::Final)?;
        }
        if self.state.name == here {
            self.raise(&Event::Null)?;
        }
        if self.state.name == here && self.state.is_atomic() && self.state.steps.is_empty() {
            self.raise(&Event::NoSteps)?;
        }

        Ok(())
    }

    fn raise(&mut self, event: &Event) -> Result<(), ExecutionError> {
        match self.dispatch(event, EntryOpts::default()) {
            Ok(()) => Ok(()),
            Err(ExecutionError::NoTransition { .. }) => Ok(()),
            Err(other) => Err(other),
        }
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("chart", &self.chart.name())
            .field("state", &self.state.name)
            .field("history_depth", &self.history.len())
            .field("queued_actions", &self.actions)
            .finish()
    }
}
