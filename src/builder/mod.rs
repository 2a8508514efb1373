//! Programmatic chart construction.
//!
//! A [`ChartBuilder`] collects state declarations through closure-based
//! bodies and compiles them into an immutable [`Chart`]: relative targets
//! are resolved against each declaring state's absolute path, step orders
//! are assigned, and the whole structure is validated. Compilation fails
//! with a [`ChartError`] rather than producing a chart that could fail at
//! interpretation time.
//!
//! # Example
//!
//! ```rust
//! use waymark::builder::{ChartBuilder, StepOpts};
//!
//! let chart = ChartBuilder::new("sale")
//!     .subject("sale", "Sale")
//!     .initial("pending")
//!     .state("pending", |s| s.on("send", "sent"))
//!     .state("sent", |s| {
//!         s.step("close", StepOpts::default())
//!             .on_completed("close", "closed")
//!     })
//!     .state("closed", |s| s.terminal())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(chart.initial_state(), "pending");
//! ```

pub mod error;
pub mod target;

pub use error::ChartError;
pub use target::{TargetRef, Targets};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use crate::core::chart::{Chart, SubjectBinding};
use crate::core::event::Event;
use crate::core::state::{State, StateKind};
use crate::core::step::Step;
use crate::core::transition::Transition;

type TemplateFn = Rc<dyn Fn(StateBuilder) -> StateBuilder>;

/// Options attached to a step declaration.
#[derive(Clone, Debug, Default)]
pub struct StepOpts {
    participant: Option<String>,
    repeatable: bool,
}

impl StepOpts {
    /// No participant, not repeatable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the step with the role expected to complete it.
    pub fn participant(mut self, tag: impl Into<String>) -> Self {
        self.participant = Some(tag.into());
        self
    }

    /// Allow the step to be re-completed idempotently.
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }
}

/// Options attached to a transition declaration.
#[derive(Clone, Debug, Default)]
pub struct TransitionOpts {
    reset: Option<bool>,
    actions: Vec<String>,
}

impl TransitionOpts {
    /// Default policy: reset on self transitions, no actions.
    pub fn new() -> Self {
        Self::default()
    }

    /// A self-targeted transition that only queues actions without
    /// re-entering the state.
    pub fn no_reset() -> Self {
        Self {
            reset: Some(false),
            actions: Vec::new(),
        }
    }

    /// Set the reset policy explicitly.
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Queue an action tag when the transition is taken.
    pub fn action(mut self, tag: impl Into<String>) -> Self {
        self.actions.push(tag.into());
        self
    }
}

#[derive(Clone, Debug)]
struct StepDecl {
    name: String,
    participant: Option<String>,
    repeatable: bool,
    order: u32,
}

#[derive(Clone, Debug)]
struct TransitionDecl {
    event: Event,
    targets: Vec<TargetRef>,
    reset: bool,
    actions: Vec<String>,
}

#[derive(Default)]
struct StateDecl {
    id: String,
    terminal: bool,
    initial_child: Option<String>,
    steps: Vec<StepDecl>,
    repeatable: Vec<String>,
    entry_actions: Vec<String>,
    exit_actions: Vec<String>,
    transitions: Vec<TransitionDecl>,
    children: Vec<StateDecl>,
    next_order: u32,
    errors: Vec<ChartError>,
}

impl StateDecl {
    fn new(id: String) -> Self {
        Self {
            id,
            next_order: 1,
            ..Default::default()
        }
    }
}

/// Builder for a parallel step block: every step declared inside shares one
/// order number.
pub struct ParallelBuilder {
    steps: Vec<(String, StepOpts)>,
}

impl ParallelBuilder {
    /// Declare a step belonging to the parallel group.
    pub fn step(mut self, id: impl Into<String>, opts: StepOpts) -> Self {
        self.steps.push((id.into(), opts));
        self
    }
}

/// Builder for a single state body.
///
/// Returned methods consume and return `self` so bodies read as a chain of
/// declarations. Validation is deferred to [`ChartBuilder::build`].
pub struct StateBuilder {
    decl: StateDecl,
    templates: HashMap<String, TemplateFn>,
}

impl StateBuilder {
    fn new(id: String, templates: HashMap<String, TemplateFn>) -> Self {
        Self {
            decl: StateDecl::new(id),
            templates,
        }
    }

    /// Name the child state entered on descent (compound states only).
    pub fn initial(mut self, child_id: impl Into<String>) -> Self {
        self.decl.initial_child = Some(child_id.into());
        self
    }

    /// Mark this state as a final leaf.
    pub fn terminal(mut self) -> Self {
        self.decl.terminal = true;
        self
    }

    /// Declare a sequential step; each call gets the next order number.
    pub fn step(mut self, id: impl Into<String>, opts: StepOpts) -> Self {
        let order = self.decl.next_order;
        self.decl.next_order += 1;
        self.push_step(id.into(), opts, order);
        self
    }

    /// Declare a block of parallel steps sharing one order number.
    pub fn parallel(mut self, body: impl FnOnce(ParallelBuilder) -> ParallelBuilder) -> Self {
        let block = body(ParallelBuilder { steps: Vec::new() });
        let order = self.decl.next_order;
        self.decl.next_order += 1;
        for (id, opts) in block.steps {
            self.push_step(id, opts, order);
        }
        self
    }

    /// Mark an already-declared step as repeatable.
    pub fn repeatable(mut self, step_id: impl Into<String>) -> Self {
        self.decl.repeatable.push(step_id.into());
        self
    }

    /// Queue an action tag on every entry into this state.
    pub fn on_entry(mut self, tag: impl Into<String>) -> Self {
        self.decl.entry_actions.push(tag.into());
        self
    }

    /// Queue an action tag whenever this state is left.
    pub fn on_exit(mut self, tag: impl Into<String>) -> Self {
        self.decl.exit_actions.push(tag.into());
        self
    }

    /// Handle a named event.
    pub fn on(self, event: impl Into<String>, targets: impl Into<Targets>) -> Self {
        self.on_with(event, targets, TransitionOpts::default())
    }

    /// Handle a named event with explicit options.
    pub fn on_with(
        self,
        event: impl Into<String>,
        targets: impl Into<Targets>,
        opts: TransitionOpts,
    ) -> Self {
        self.push_transition(Event::Named(event.into()), targets, opts)
    }

    /// Handle completion of a step.
    pub fn on_completed(self, step: impl Into<String>, targets: impl Into<Targets>) -> Self {
        self.on_completed_with(step, targets, TransitionOpts::default())
    }

    /// Handle completion of a step, with explicit options.
    pub fn on_completed_with(
        self,
        step: impl Into<String>,
        targets: impl Into<Targets>,
        opts: TransitionOpts,
    ) -> Self {
        self.push_transition(Event::Completed(step.into()), targets, opts)
    }

    /// Handle a decision recorded on a step.
    pub fn on_decision(
        self,
        step: impl Into<String>,
        choice: impl Into<String>,
        targets: impl Into<Targets>,
    ) -> Self {
        self.on_decision_with(step, choice, targets, TransitionOpts::default())
    }

    /// Handle a decision recorded on a step, with explicit options.
    pub fn on_decision_with(
        self,
        step: impl Into<String>,
        choice: impl Into<String>,
        targets: impl Into<Targets>,
        opts: TransitionOpts,
    ) -> Self {
        self.push_transition(Event::Decision(step.into(), choice.into()), targets, opts)
    }

    /// Handle the synthetic null event raised on every entry; used for
    /// dynamic initial routing.
    pub fn on_any(self, targets: impl Into<Targets>) -> Self {
        self.on_any_with(targets, TransitionOpts::default())
    }

    /// Handle the synthetic null event, with explicit options.
    pub fn on_any_with(self, targets: impl Into<Targets>, opts: TransitionOpts) -> Self {
        self.push_transition(Event::Null, targets, opts)
    }

    /// Handle the synthetic event raised when a descendant final leaf is
    /// entered.
    pub fn on_final(self, targets: impl Into<Targets>) -> Self {
        self.on_final_with(targets, TransitionOpts::default())
    }

    /// Handle the synthetic final event, with explicit options.
    pub fn on_final_with(self, targets: impl Into<Targets>, opts: TransitionOpts) -> Self {
        self.push_transition(Event::Final, targets, opts)
    }

    /// Handle the synthetic event raised when an atomic leaf is entered
    /// with no surviving steps.
    pub fn on_no_steps(self, targets: impl Into<Targets>) -> Self {
        self.on_no_steps_with(targets, TransitionOpts::default())
    }

    /// Handle the synthetic no-steps event, with explicit options.
    pub fn on_no_steps_with(self, targets: impl Into<Targets>, opts: TransitionOpts) -> Self {
        self.push_transition(Event::NoSteps, targets, opts)
    }

    /// Declare a nested child state.
    pub fn state(
        mut self,
        id: impl Into<String>,
        body: impl FnOnce(StateBuilder) -> StateBuilder,
    ) -> Self {
        let child = body(StateBuilder::new(id.into(), self.templates.clone()));
        self.decl.children.push(child.decl);
        self
    }

    /// Inject a template body registered with
    /// [`ChartBuilder::template`] into this state.
    pub fn using(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match self.templates.get(&name).cloned() {
            Some(template) => template(self),
            None => {
                let state = self.decl.id.clone();
                self.decl
                    .errors
                    .push(ChartError::UnknownTemplate { state, name });
                self
            }
        }
    }

    fn push_step(&mut self, name: String, opts: StepOpts, order: u32) {
        if opts.repeatable {
            self.decl.repeatable.push(name.clone());
        }
        self.decl.steps.push(StepDecl {
            name,
            participant: opts.participant,
            repeatable: opts.repeatable,
            order,
        });
    }

    fn push_transition(
        mut self,
        event: Event,
        targets: impl Into<Targets>,
        opts: TransitionOpts,
    ) -> Self {
        self.decl.transitions.push(TransitionDecl {
            event,
            targets: targets.into().0,
            reset: opts.reset.unwrap_or(true),
            actions: opts.actions,
        });
        self
    }
}

/// Builder producing an immutable [`Chart`].
pub struct ChartBuilder {
    name: String,
    subject: Option<SubjectBinding>,
    participants: Vec<String>,
    initial: Option<String>,
    roots: Vec<StateDecl>,
    templates: HashMap<String, TemplateFn>,
}

impl ChartBuilder {
    /// Start a chart with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: None,
            participants: Vec::new(),
            initial: None,
            roots: Vec::new(),
            templates: HashMap::new(),
        }
    }

    /// Bind the chart to a host entity: the context key it travels under
    /// and its host-side type name.
    pub fn subject(mut self, key: impl Into<String>, kind: impl Into<String>) -> Self {
        self.subject = Some(SubjectBinding {
            key: key.into(),
            kind: kind.into(),
        });
        self
    }

    /// Declare a participant role tag.
    pub fn participant(mut self, tag: impl Into<String>) -> Self {
        self.participants.push(tag.into());
        self
    }

    /// Name the state a fresh execution enters (required).
    pub fn initial(mut self, id: impl Into<String>) -> Self {
        self.initial = Some(id.into());
        self
    }

    /// Register a reusable state body, injected via
    /// [`StateBuilder::using`].
    pub fn template(
        mut self,
        name: impl Into<String>,
        body: impl Fn(StateBuilder) -> StateBuilder + 'static,
    ) -> Self {
        self.templates.insert(name.into(), Rc::new(body));
        self
    }

    /// Declare a top-level state.
    pub fn state(
        mut self,
        id: impl Into<String>,
        body: impl FnOnce(StateBuilder) -> StateBuilder,
    ) -> Self {
        let builder = body(StateBuilder::new(id.into(), self.templates.clone()));
        self.roots.push(builder.decl);
        self
    }

    /// Compile the declarations into a chart.
    pub fn build(self) -> Result<Chart, ChartError> {
        let initial = self.initial.ok_or_else(|| ChartError::MissingInitialState {
            chart: self.name.clone(),
        })?;

        let mut states = BTreeMap::new();
        let mut pending_transitions = Vec::new();
        for decl in &self.roots {
            compile_state(decl, None, &mut states, &mut pending_transitions)?;
        }

        if !states.contains_key(&initial) {
            return Err(ChartError::UnknownInitialState {
                chart: self.name,
                initial,
            });
        }

        for state in states.values() {
            if let Some(child) = &state.initial_child {
                if !states.contains_key(child) {
                    return Err(ChartError::InvalidInitialState {
                        state: state.name.clone(),
                        initial: child.clone(),
                    });
                }
            }
        }

        resolve_transitions(&mut states, pending_transitions)?;

        let mut participants = self.participants;
        for state in states.values() {
            for step in &state.steps {
                if let Some(tag) = &step.participant {
                    if !participants.contains(tag) {
                        participants.push(tag.clone());
                    }
                }
            }
        }

        Ok(Chart {
            name: self.name,
            subject: self.subject,
            initial_state: initial,
            states,
            participants,
        })
    }
}

fn compile_state(
    decl: &StateDecl,
    parent: Option<&str>,
    states: &mut BTreeMap<String, State>,
    pending: &mut Vec<(String, TransitionDecl)>,
) -> Result<(), ChartError> {
    if let Some(err) = decl.errors.first() {
        return Err(err.clone());
    }

    let name = match parent {
        Some(parent) => format!("{parent}.{}", decl.id),
        None => decl.id.clone(),
    };

    if states.contains_key(&name) {
        return Err(ChartError::DuplicateState { state: name });
    }

    let has_children = !decl.children.is_empty();
    if decl.terminal && has_children {
        return Err(ChartError::FinalWithChildren { state: name });
    }
    if has_children && !decl.steps.is_empty() {
        return Err(ChartError::StepsInCompound { state: name });
    }

    let kind = if decl.terminal {
        StateKind::Final
    } else if has_children {
        StateKind::Compound
    } else {
        StateKind::Atomic
    };

    let mut state = State::new(name.clone(), kind);

    match (&decl.initial_child, kind) {
        (Some(child), StateKind::Compound) => {
            state.initial_child = Some(format!("{name}.{child}"));
        }
        (Some(child), _) => {
            return Err(ChartError::InvalidInitialState {
                state: name,
                initial: child.clone(),
            });
        }
        (None, StateKind::Compound) => {
            return Err(ChartError::MissingInitialChild { state: name });
        }
        (None, _) => {}
    }

    let mut seen = BTreeSet::new();
    for step in &decl.steps {
        if !seen.insert(step.name.clone()) {
            return Err(ChartError::DuplicateStep {
                state: name,
                step: step.name.clone(),
            });
        }
        let mut compiled = Step::new(step.name.clone(), step.order);
        compiled.participant = step.participant.clone();
        state.steps.push(compiled);
        if step.repeatable {
            state.repeatable_steps.insert(step.name.clone());
        }
    }
    for repeatable in &decl.repeatable {
        state.repeatable_steps.insert(repeatable.clone());
    }

    state.entry_actions = decl.entry_actions.clone();
    state.exit_actions = decl.exit_actions.clone();

    for transition in &decl.transitions {
        pending.push((name.clone(), transition.clone()));
    }

    states.insert(name.clone(), state);

    for child in &decl.children {
        compile_state(child, Some(&name), states, pending)?;
    }

    Ok(())
}

fn resolve_transitions(
    states: &mut BTreeMap<String, State>,
    pending: Vec<(String, TransitionDecl)>,
) -> Result<(), ChartError> {
    for (state_name, decl) in pending {
        let mut targets = Vec::with_capacity(decl.targets.len());
        for target in &decl.targets {
            let resolved =
                target
                    .resolve(&state_name)
                    .ok_or_else(|| ChartError::UnresolvableTarget {
                        state: state_name.clone(),
                        target: target.describe(),
                    })?;
            if !states.contains_key(&resolved) {
                return Err(ChartError::UnknownTarget {
                    state: state_name,
                    target: resolved,
                });
            }
            targets.push(resolved);
        }

        let transition = Transition {
            event: decl.event.clone(),
            targets,
            reset: decl.reset,
            actions: decl.actions,
        };
        if let Some(state) = states.get_mut(&state_name) {
            state.transitions.insert(decl.event, transition);
        }
    }
    Ok(())
}
