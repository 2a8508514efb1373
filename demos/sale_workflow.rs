//! Sale Workflow
//!
//! This example demonstrates a sale attached to a workflow: dispatching
//! events, completing checklist steps, and persisting the execution.
//!
//! Key concepts:
//! - Chart compiled once, shared by every execution
//! - Steps gate progress (close must be completed to finish)
//! - Dump + repository round trip with optimistic locking
//!
//! Run with: cargo run --example sale_workflow

use std::sync::Arc;

use waymark::builder::{ChartBuilder, StepOpts};
use waymark::core::Event;
use waymark::dump::dump;
use waymark::execution::{Context, Execution, NoopCallbacks};
use waymark::persistence::{
    InMemoryRepository, SubjectId, UpdateOpts, WorkflowFilter, WorkflowRepository,
};

fn main() {
    println!("=== Sale Workflow ===\n");

    let chart = Arc::new(
        ChartBuilder::new("sale")
            .subject("sale", "Sale")
            .participant("seller")
            .initial("pending")
            .state("pending", |s| s.on("send", "sent"))
            .state("sent", |s| {
                s.step("close", StepOpts::new().participant("seller"))
                    .on_completed("close", "closed")
            })
            .state("closed", |s| s.terminal())
            .build()
            .expect("chart compiles"),
    );

    println!("Chart: pending -> sent (step: close) -> closed\n");

    let callbacks = Arc::new(NoopCallbacks);
    let mut execution =
        Execution::new(chart, callbacks, Context::new()).expect("fresh execution");
    println!("New sale starts in `{}`", execution.state_name());

    // persist the fresh workflow
    let repository = InMemoryRepository::new();
    let subject = SubjectId::new("sale", "42");
    let record = repository
        .create(&subject, &dump(&execution))
        .expect("create record");
    println!("Persisted workflow {} at lock_version {}\n", record.id, record.lock_version);

    // drive the workflow
    execution
        .transition(&Event::named("send"))
        .expect("send the sale");
    println!("After `send`: state `{}`", execution.state_name());

    execution.complete("close").expect("close the sale");
    println!(
        "After completing `close`: state `{}`, complete: {}\n",
        execution.state_name(),
        execution.is_complete()
    );

    // write back under the optimistic lock
    let updated = repository
        .update(&record, &dump(&execution), &UpdateOpts::new())
        .expect("update record");
    println!(
        "Updated workflow to `{}` at lock_version {}",
        updated.state, updated.lock_version
    );

    // query by workflow position
    let closed = repository.find(&WorkflowFilter::state_equals("closed"));
    println!("Sales in `closed`: {}", closed.len());

    println!("\nKey Takeaways:");
    println!("- Events move the workflow, steps gate the moves");
    println!("- The dump is the persistence contract");
    println!("- lock_version serializes concurrent writers");

    println!("\n=== Example Complete ===");
}
