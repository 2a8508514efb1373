//! Chart validation errors.

use thiserror::Error;

/// Errors raised while compiling a chart.
///
/// All of them mean the chart declaration itself is malformed; none can
/// occur at interpretation time once `build()` has succeeded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("chart `{chart}` has no initial state. Call .initial(state) before .build()")]
    MissingInitialState { chart: String },

    #[error("initial state `{initial}` of chart `{chart}` does not exist")]
    UnknownInitialState { chart: String, initial: String },

    #[error("compound state `{state}` declares no initial child")]
    MissingInitialChild { state: String },

    #[error("initial state `{initial}` of `{state}` is not a descendant")]
    InvalidInitialState { state: String, initial: String },

    #[error("state `{state}` is declared twice")]
    DuplicateState { state: String },

    #[error("step `{step}` is declared twice in state `{state}`")]
    DuplicateStep { state: String, step: String },

    #[error("compound state `{state}` cannot carry steps")]
    StepsInCompound { state: String },

    #[error("final state `{state}` cannot have children")]
    FinalWithChildren { state: String },

    #[error("cannot resolve target `{target}` from state `{state}`")]
    UnresolvableTarget { state: String, target: String },

    #[error("transition in `{state}` points to unknown state `{target}`")]
    UnknownTarget { state: String, target: String },

    #[error("unknown template `{name}` used in state `{state}`")]
    UnknownTemplate { state: String, name: String },
}
