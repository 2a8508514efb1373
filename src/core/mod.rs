//! Core chart data model: steps, events, transitions, states, charts.
//!
//! Everything here is a plain value. The builder produces them, the
//! interpreter copies and mutates them per execution, and the chart itself
//! stays immutable for its whole life.

pub mod chart;
pub mod event;
pub mod state;
pub mod step;
pub mod transition;

pub use chart::{Chart, SubjectBinding};
pub use event::Event;
pub use state::{is_child_of, is_sibling_of, last_segment, parent_path, State, StateKind};
pub use step::Step;
pub use transition::Transition;
