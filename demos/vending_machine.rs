//! Vending Machine
//!
//! This example demonstrates dynamic routing with the null transition:
//! every coin re-enters `calculating`, which immediately resolves to
//! `paid` or `paying` depending on how much money is in the context.
//!
//! Key concepts:
//! - Null transition with guarded fallthrough ([paid, paying])
//! - Guards read the context, actions update it
//! - Action drain applies context updates in FIFO order
//!
//! Run with: cargo run --example vending_machine

use std::sync::Arc;

use serde_json::{json, Value};

use waymark::builder::ChartBuilder;
use waymark::core::Event;
use waymark::execution::{ActionOutcome, Callbacks, Context, Execution};

const PRICE: i64 = 100;

struct Machine;

impl Callbacks for Machine {
    fn guard(&self, _from: &str, to: &str, ctx: &Context) -> Result<(), String> {
        if to != "working.paid" {
            return Ok(());
        }
        let paid: i64 = ctx
            .get("coins")
            .and_then(Value::as_array)
            .map(|coins| coins.iter().filter_map(Value::as_i64).sum())
            .unwrap_or(0);
        if paid >= PRICE {
            Ok(())
        } else {
            Err(format!("need {} more", PRICE - paid))
        }
    }

    fn action(&self, tag: &str, ctx: &Context) -> ActionOutcome {
        match tag {
            "vend" => {
                let selection = ctx.get("selected").cloned().unwrap_or(Value::Null);
                let mut next = ctx.clone();
                next.insert("vending".into(), selection);
                next.insert("coins".into(), json!([]));
                ActionOutcome::UpdateContext(next)
            }
            _ => ActionOutcome::Unhandled,
        }
    }
}

fn insert_coin(execution: &mut Execution, coin: i64) {
    let mut coins = execution
        .context()
        .get("coins")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    coins.push(json!(coin));
    execution.context_mut().insert("coins".into(), json!(coins));
    execution
        .transition(&Event::named("coin"))
        .expect("coin event");
    println!("  inserted {:>3} -> {}", coin, execution.state_name());
}

fn main() {
    println!("=== Vending Machine ===\n");

    let chart = Arc::new(
        ChartBuilder::new("vending")
            .initial("working")
            .state("working", |s| {
                s.initial("waiting")
                    .state("waiting", |c| c.on("coin", "calculating"))
                    .state("calculating", |c| c.on_any(["paid", "paying"]))
                    .state("paying", |c| c.on("coin", "calculating"))
                    .state("paid", |c| c.on("select", "vending"))
                    .state("vending", |c| c.on_entry("vend").on("vended", "waiting"))
            })
            .build()
            .expect("chart compiles"),
    );

    let mut execution =
        Execution::new(chart, Arc::new(Machine), Context::new()).expect("fresh execution");
    println!("Machine ready in `{}`\n", execution.state_name());

    println!("Feeding coins (price is {PRICE}):");
    for coin in [10, 25, 25, 25, 10, 5] {
        insert_coin(&mut execution, coin);
    }

    println!("\nSelecting item a1:");
    execution.context_mut().insert("selected".into(), json!("a1"));
    execution
        .transition(&Event::named("select"))
        .expect("select event");
    let drain = execution.execute_actions();
    assert!(drain.is_ok(), "vend action runs");
    println!(
        "  vending {:?}, coins returned to {:?}",
        execution.context().get("vending"),
        execution.context().get("coins")
    );

    execution
        .transition(&Event::named("vended"))
        .expect("vended event");
    println!("  back to `{}`", execution.state_name());

    println!("\nKey Takeaways:");
    println!("- `calculating` never rests: the null transition routes it on entry");
    println!("- Guards decide between paid and paying from the context");
    println!("- The vend action updates the context during the drain");

    println!("\n=== Example Complete ===");
}
