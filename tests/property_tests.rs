//! Property-based tests for the interpreter.
//!
//! These drive a nested order-processing chart with randomly generated
//! event and completion sequences, checking the interpreter's invariants
//! after every operation.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use waymark::builder::{ChartBuilder, StepOpts, TargetRef, TransitionOpts};
use waymark::core::{Chart, Event};
use waymark::dump::{dump, restore};
use waymark::execution::{ActionOutcome, Callbacks, Context, Execution};

fn order_chart() -> Arc<Chart> {
    Arc::new(
        ChartBuilder::new("order")
            .initial("draft")
            .state("draft", |s| {
                s.on("submit", "review").on_with(
                    "tweak",
                    TargetRef::this(),
                    TransitionOpts::no_reset().action("touch"),
                )
            })
            .state("review", |s| {
                s.parallel(|p| {
                    p.step("check_stock", StepOpts::default())
                        .step("check_credit", StepOpts::default())
                })
                .step("approve", StepOpts::default())
                .step("ping", StepOpts::new().repeatable())
                .on_completed("approve", "fulfil")
                .on("reject", "draft")
                .on("cancel", "cancelled")
            })
            .state("fulfil", |s| {
                s.initial("packing")
                    .on_final("done")
                    .state("packing", |c| {
                        c.step("pack", StepOpts::default())
                            .on_completed("pack", "shipped")
                    })
                    .state("shipped", |c| c.terminal())
            })
            .state("done", |s| s.terminal())
            .state("cancelled", |s| s.terminal())
            .build()
            .unwrap(),
    )
}

struct OrderHost;

impl Callbacks for OrderHost {
    fn use_step(&self, step: &str, ctx: &Context) -> bool {
        let skip_credit = ctx
            .get("skip_credit")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        !(step == "check_credit" && skip_credit)
    }

    fn action(&self, tag: &str, _ctx: &Context) -> ActionOutcome {
        match tag {
            "touch" => ActionOutcome::Ok,
            _ => ActionOutcome::Unhandled,
        }
    }
}

#[derive(Clone, Debug)]
enum Op {
    Event(String),
    Complete(String),
    Decision(String, String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::sample::select(vec!["submit", "tweak", "reject", "cancel", "bogus"])
            .prop_map(|e| Op::Event(e.to_string())),
        prop::sample::select(vec![
            "check_stock",
            "check_credit",
            "approve",
            "ping",
            "pack",
            "missing",
        ])
        .prop_map(|s| Op::Complete(s.to_string())),
        (
            prop::sample::select(vec!["approve", "pack"]),
            prop::sample::select(vec!["yes", "no"]),
        )
            .prop_map(|(s, c)| Op::Decision(s.to_string(), c.to_string())),
    ]
}

fn apply(execution: &mut Execution, op: &Op) -> Result<(), waymark::ExecutionError> {
    match op {
        Op::Event(tag) => execution.transition(&Event::named(tag)),
        Op::Complete(step) => execution.complete(step),
        Op::Decision(step, choice) => execution.decision(step, choice),
    }
}

fn step_multiset(steps: impl Iterator<Item = (String, u32)>) -> BTreeSet<(String, u32)> {
    steps.collect()
}

proptest! {
    #[test]
    fn interpreter_invariants_hold(
        ops in prop::collection::vec(op_strategy(), 0..25),
        skip_credit in any::<bool>(),
    ) {
        let chart = order_chart();
        let callbacks: Arc<dyn Callbacks> = Arc::new(OrderHost);
        let mut ctx = Context::new();
        ctx.insert("skip_credit".into(), json!(skip_credit));

        let mut execution =
            Execution::new(chart.clone(), callbacks.clone(), ctx).unwrap();

        for op in &ops {
            let prior_name = execution.state_name().to_string();
            let prior_dump = dump(&execution);
            let prior_history: Vec<String> =
                execution.history().map(|s| s.name.clone()).collect();
            let prior_actions = execution.queued_actions().to_vec();

            match apply(&mut execution, op) {
                Ok(()) => {
                    // the current state always belongs to the chart
                    prop_assert!(chart.contains(execution.state_name()));

                    if execution.state_name() == prior_name {
                        // staying put never touches history
                        let history: Vec<String> =
                            execution.history().map(|s| s.name.clone()).collect();
                        prop_assert_eq!(history, prior_history);
                    } else {
                        // moving pushes the prior state onto history
                        prop_assert!(execution.history().any(|s| s.name == prior_name));
                        prop_assert!(execution.history().count() > prior_history.len());
                    }
                }
                Err(_) => {
                    // failures leave the execution untouched
                    prop_assert_eq!(execution.state_name(), prior_name.as_str());
                    prop_assert_eq!(dump(&execution), prior_dump);
                    let history: Vec<String> =
                        execution.history().map(|s| s.name.clone()).collect();
                    prop_assert_eq!(history, prior_history);
                    prop_assert_eq!(execution.queued_actions(), prior_actions.as_slice());
                }
            }

            // kept and ignored steps are a permutation of the chart's
            let current = execution.state();
            let pristine = chart.state(execution.state_name()).unwrap();
            let live = step_multiset(
                current
                    .steps
                    .iter()
                    .chain(current.ignored_steps.iter())
                    .map(|s| (s.name.clone(), s.order)),
            );
            let original =
                step_multiset(pristine.steps.iter().map(|s| (s.name.clone(), s.order)));
            prop_assert_eq!(live, original);
        }

        // dump survives a persistence round trip
        let snapshot = dump(&execution);
        let restored = restore(
            chart,
            callbacks,
            execution.context().clone(),
            &snapshot,
        )
        .unwrap();
        prop_assert_eq!(dump(&restored), snapshot);
    }

    #[test]
    fn repeatable_completion_is_idempotent(repeats in 1..5usize) {
        let chart = Arc::new(
            ChartBuilder::new("repeat")
                .initial("work")
                .state("work", |s| {
                    s.step("ping", StepOpts::new().repeatable())
                        .step("approve", StepOpts::default())
                })
                .build()
                .unwrap(),
        );
        let callbacks: Arc<dyn Callbacks> = Arc::new(OrderHost);
        let mut execution =
            Execution::new(chart, callbacks, Context::new()).unwrap();

        execution.complete("ping").unwrap();
        let baseline = dump(&execution);

        for _ in 0..repeats {
            execution.complete("ping").unwrap();
            prop_assert_eq!(dump(&execution), baseline.clone());
        }
    }

    #[test]
    fn guarded_fallthrough_is_deterministic(
        allow_a in any::<bool>(),
        allow_b in any::<bool>(),
        allow_c in any::<bool>(),
    ) {
        struct Router;

        impl Callbacks for Router {
            fn guard(&self, _from: &str, to: &str, ctx: &Context) -> Result<(), String> {
                let key = format!("allow_{to}");
                if ctx.get(&key).and_then(Value::as_bool).unwrap_or(false) {
                    Ok(())
                } else {
                    Err(format!("{to} not allowed"))
                }
            }
        }

        let chart = Arc::new(
            ChartBuilder::new("routing")
                .initial("unknown")
                .state("unknown", |s| {
                    s.step("wait", StepOpts::default()).on_any(["a", "b", "c"])
                })
                .state("a", |s| s.step("wait", StepOpts::default()))
                .state("b", |s| s.step("wait", StepOpts::default()))
                .state("c", |s| s.step("wait", StepOpts::default()))
                .build()
                .unwrap(),
        );

        let mut ctx = Context::new();
        ctx.insert("allow_a".into(), json!(allow_a));
        ctx.insert("allow_b".into(), json!(allow_b));
        ctx.insert("allow_c".into(), json!(allow_c));

        let execution = Execution::new(chart, Arc::new(Router), ctx).unwrap();

        // the first target that exists and passes the guard wins
        let expected = if allow_a {
            "a"
        } else if allow_b {
            "b"
        } else if allow_c {
            "c"
        } else {
            "unknown"
        };
        prop_assert_eq!(execution.state_name(), expected);
    }
}
