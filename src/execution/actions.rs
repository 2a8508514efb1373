//! Draining the action queue against the host.
//!
//! Actions accumulate on the execution while transitions resolve and are
//! executed exactly once, in FIFO order, when the host calls
//! [`Execution::execute_actions`]. Actions never drive transitions; they
//! only observe and amend the context.

use serde_json::{Map, Value};
use tracing::debug;

use crate::execution::callbacks::ActionOutcome;
use crate::execution::error::ExecutionError;
use crate::execution::Execution;

/// Outcome of one drain pass.
///
/// `results` holds per-tag values produced by `ActionOutcome::Value`. When
/// `error` is set, the drain stopped at the failing action and the
/// execution retains every action queued after it.
#[derive(Clone, Debug, Default)]
pub struct ActionDrain {
    /// Values recorded by actions, keyed by tag.
    pub results: Map<String, Value>,
    /// The failure that aborted the drain, if any.
    pub error: Option<ExecutionError>,
}

impl ActionDrain {
    /// Whether every queued action ran.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl Execution {
    /// Run every queued action through the host, in FIFO order.
    ///
    /// Context updates returned by actions apply immediately and are
    /// visible to the actions that follow. A failing or unhandled action
    /// aborts the drain; actions already run are not rolled back.
    pub fn execute_actions(&mut self) -> ActionDrain {
        let queued = self.take_queued_actions();
        let mut results = Map::new();

        for (index, tag) in queued.iter().enumerate() {
            debug!(action = %tag, "executing action");
            let outcome = self.callbacks().action(tag, self.context());
            match outcome {
                ActionOutcome::Ok => {}
                ActionOutcome::Value(value) => {
                    results.insert(tag.clone(), value);
                }
                ActionOutcome::UpdateContext(context) => {
                    self.set_context(context);
                }
                ActionOutcome::Put(key, value) => {
                    self.context_mut().insert(key, value);
                }
                ActionOutcome::Fail(reason) => {
                    self.requeue_actions(queued[index + 1..].to_vec());
                    return ActionDrain {
                        results,
                        error: Some(ExecutionError::ActionFailed {
                            tag: tag.clone(),
                            reason,
                        }),
                    };
                }
                ActionOutcome::Unhandled => {
                    self.requeue_actions(queued[index + 1..].to_vec());
                    return ActionDrain {
                        results,
                        error: Some(ExecutionError::UnknownAction { tag: tag.clone() }),
                    };
                }
            }
        }

        ActionDrain {
            results,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::builder::{ChartBuilder, TransitionOpts};
    use crate::core::chart::Chart;
    use crate::core::event::Event;
    use crate::execution::callbacks::{Callbacks, Context};

    fn chart_with_actions() -> Arc<Chart> {
        Arc::new(
            ChartBuilder::new("actions")
                .initial("idle")
                .state("idle", |s| {
                    s.on_with(
                        "go",
                        "busy",
                        TransitionOpts::new().action("first").action("second"),
                    )
                })
                .state("busy", |s| s.terminal())
                .build()
                .unwrap(),
        )
    }

    struct Recorder;

    impl Callbacks for Recorder {
        fn action(&self, tag: &str, ctx: &Context) -> ActionOutcome {
            match tag {
                "first" => ActionOutcome::Put("first_ran".into(), json!(true)),
                "second" => {
                    // context updates from earlier actions are visible
                    assert_eq!(ctx.get("first_ran"), Some(&json!(true)));
                    ActionOutcome::Value(json!("second result"))
                }
                _ => ActionOutcome::Unhandled,
            }
        }
    }

    #[test]
    fn drain_runs_fifo_and_applies_context_updates() {
        let mut execution =
            Execution::new(chart_with_actions(), Arc::new(Recorder), Context::new()).unwrap();
        execution.transition(&Event::named("go")).unwrap();

        let drain = execution.execute_actions();
        assert!(drain.is_ok());
        assert_eq!(drain.results.get("second"), Some(&json!("second result")));
        assert_eq!(execution.context().get("first_ran"), Some(&json!(true)));
        assert!(execution.queued_actions().is_empty());
    }

    struct FailsSecond;

    impl Callbacks for FailsSecond {
        fn action(&self, tag: &str, _ctx: &Context) -> ActionOutcome {
            match tag {
                "first" => ActionOutcome::Ok,
                "second" => ActionOutcome::Fail("boom".into()),
                _ => ActionOutcome::Ok,
            }
        }
    }

    #[test]
    fn failing_action_aborts_and_keeps_remainder() {
        let chart = Arc::new(
            ChartBuilder::new("actions")
                .initial("idle")
                .state("idle", |s| {
                    s.on_with(
                        "go",
                        "busy",
                        TransitionOpts::new()
                            .action("first")
                            .action("second")
                            .action("third"),
                    )
                })
                .state("busy", |s| s.terminal())
                .build()
                .unwrap(),
        );
        let mut execution =
            Execution::new(chart, Arc::new(FailsSecond), Context::new()).unwrap();
        execution.transition(&Event::named("go")).unwrap();

        let drain = execution.execute_actions();
        assert_eq!(
            drain.error,
            Some(ExecutionError::ActionFailed {
                tag: "second".into(),
                reason: "boom".into(),
            })
        );
        assert_eq!(execution.queued_actions(), ["third"]);
    }

    #[test]
    fn unhandled_action_surfaces_unknown_action() {
        let mut execution = Execution::new(
            chart_with_actions(),
            Arc::new(crate::execution::NoopCallbacks),
            Context::new(),
        )
        .unwrap();
        execution.transition(&Event::named("go")).unwrap();

        let drain = execution.execute_actions();
        assert_eq!(
            drain.error,
            Some(ExecutionError::UnknownAction {
                tag: "first".into(),
            })
        );
        // the unhandled action is consumed, the rest is retained
        assert_eq!(execution.queued_actions(), ["second"]);
    }

    struct Replacer;

    impl Callbacks for Replacer {
        fn action(&self, tag: &str, _ctx: &Context) -> ActionOutcome {
            match tag {
                "first" => {
                    let mut fresh = Context::new();
                    fresh.insert("replaced".into(), json!(true));
                    ActionOutcome::UpdateContext(fresh)
                }
                _ => ActionOutcome::Ok,
            }
        }
    }

    #[test]
    fn update_context_replaces_the_mapping() {
        let mut seed = Context::new();
        seed.insert("old".into(), json!(1));

        let mut execution =
            Execution::new(chart_with_actions(), Arc::new(Replacer), seed).unwrap();
        execution.transition(&Event::named("go")).unwrap();

        let drain = execution.execute_actions();
        assert!(drain.is_ok());
        assert!(execution.context().get("old").is_none());
        assert_eq!(execution.context().get("replaced"), Some(&json!(true)));
    }
}
