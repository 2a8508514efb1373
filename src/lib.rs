//! Waymark: a hierarchical-statechart workflow engine
//!
//! Waymark drives long-lived business processes that are durably attached
//! to domain entities ("subjects"). A chart is compiled once from
//! programmatic declarations; executions interpret events against it,
//! queue named actions for the host to run, and snapshot into a
//! relational-friendly dump for persistence.
//!
//! # Core Concepts
//!
//! - **Chart**: immutable compiled statechart, states keyed by dotted path
//! - **Execution**: mutable interpreter holding current state, history and
//!   the action queue
//! - **Steps**: ordered per-state checklists, with parallel groups and
//!   repeatable steps
//! - **Callbacks**: the host capability object supplying guards, step
//!   filters and actions
//! - **Persistence port**: repository trait with optimistic locking,
//!   mirrored by an in-memory reference implementation
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use waymark::builder::{ChartBuilder, StepOpts};
//! use waymark::core::Event;
//! use waymark::execution::{Context, Execution, NoopCallbacks};
//!
//! let chart = Arc::new(
//!     ChartBuilder::new("sale")
//!         .initial("pending")
//!         .state("pending", |s| s.on("send", "sent"))
//!         .state("sent", |s| {
//!             s.step("close", StepOpts::default())
//!                 .on_completed("close", "closed")
//!         })
//!         .state("closed", |s| s.terminal())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let mut execution =
//!     Execution::new(chart, Arc::new(NoopCallbacks), Context::new()).unwrap();
//! assert_eq!(execution.state_name(), "pending");
//!
//! execution.transition(&Event::named("send")).unwrap();
//! execution.complete("close").unwrap();
//! assert!(execution.is_complete());
//! ```

pub mod builder;
pub mod core;
pub mod dump;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use builder::{ChartBuilder, ChartError, StepOpts, TargetRef, TransitionOpts};
pub use core::{Chart, Event, State, StateKind, Step, Transition};
pub use dump::{describe, dump, restore, ChartDescription, Dump, StepDump};
pub use execution::{
    ActionDrain, ActionOutcome, Callbacks, Context, EntryOpts, Execution, ExecutionError,
    NoopCallbacks,
};
pub use persistence::{
    DriverError, InMemoryRepository, RepositoryError, SubjectId, UpdateOpts, WorkflowDriver,
    WorkflowFilter, WorkflowRecord, WorkflowRepository, WorkflowStepRecord,
};
