//! Driving persisted workflows end to end.
//!
//! A [`WorkflowDriver`] composes the flow an adapter runs per request:
//! load the record for a subject, rebuild the execution, apply one
//! interpreter operation, drain the queued actions, and write the result
//! back under the optimistic lock. On transactional backends the whole
//! sequence belongs in one transaction so that a conflict rolls the
//! actions' effects back together with the record.

use std::sync::Arc;

use thiserror::Error;

use crate::core::chart::Chart;
use crate::core::event::Event;
use crate::dump::{dump, restore, Dump, StepDump};
use crate::execution::{Callbacks, Context, Execution, ExecutionError};
use crate::persistence::{
    RepositoryError, SubjectId, UpdateOpts, WorkflowRecord, WorkflowRepository,
};

/// Errors surfaced while driving a persisted workflow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The subject carries no workflow yet; call
    /// [`WorkflowDriver::load_or_create`] first.
    #[error("no workflow for subject `{0}`")]
    NotFound(SubjectId),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of one driven operation: the committed execution and record.
#[derive(Debug)]
pub struct DriverOutcome {
    /// The execution after the operation and action drain.
    pub execution: Execution,
    /// The record as written back, carrying the new `lock_version`.
    pub record: WorkflowRecord,
}

/// Runs interpreter operations against a repository-backed workflow.
pub struct WorkflowDriver<'a> {
    repository: &'a dyn WorkflowRepository,
    chart: Arc<Chart>,
    callbacks: Arc<dyn Callbacks>,
}

impl<'a> WorkflowDriver<'a> {
    /// Pair a chart and its host callbacks with a repository.
    pub fn new(
        repository: &'a dyn WorkflowRepository,
        chart: Arc<Chart>,
        callbacks: Arc<dyn Callbacks>,
    ) -> Self {
        Self {
            repository,
            chart,
            callbacks,
        }
    }

    /// Load the subject's workflow, creating it from a fresh execution
    /// when none exists yet.
    pub fn load_or_create(
        &self,
        subject: &SubjectId,
        context: Context,
    ) -> Result<Execution, DriverError> {
        match self.repository.load(subject)? {
            Some(record) => self.resume(&record, context),
            None => {
                let execution =
                    Execution::new(self.chart.clone(), self.callbacks.clone(), context)?;
                let record = self.repository.create(subject, &dump(&execution))?;
                Ok(stash_record(execution, &record))
            }
        }
    }

    /// Dispatch an event and persist the outcome.
    pub fn transition(
        &self,
        subject: &SubjectId,
        context: Context,
        event: &Event,
    ) -> Result<DriverOutcome, DriverError> {
        self.drive(subject, context, &UpdateOpts::new(), |execution| {
            execution.transition(event)
        })
    }

    /// Complete a step and persist the outcome; `opts` is recorded on the
    /// steps this update completes.
    pub fn complete(
        &self,
        subject: &SubjectId,
        context: Context,
        step: &str,
        opts: &UpdateOpts,
    ) -> Result<DriverOutcome, DriverError> {
        self.drive(subject, context, opts, |execution| execution.complete(step))
    }

    /// Record a decision on a step and persist the outcome.
    pub fn decision(
        &self,
        subject: &SubjectId,
        context: Context,
        step: &str,
        choice: &str,
        opts: &UpdateOpts,
    ) -> Result<DriverOutcome, DriverError> {
        self.drive(subject, context, opts, |execution| {
            execution.decision(step, choice)
        })
    }

    fn drive(
        &self,
        subject: &SubjectId,
        context: Context,
        opts: &UpdateOpts,
        operation: impl FnOnce(&mut Execution) -> Result<(), ExecutionError>,
    ) -> Result<DriverOutcome, DriverError> {
        let record = self
            .repository
            .load(subject)?
            .ok_or_else(|| DriverError::NotFound(subject.clone()))?;

        let mut execution = self.resume(&record, context)?;
        operation(&mut execution)?;

        let drain = execution.execute_actions();
        if let Some(error) = drain.error {
            return Err(error.into());
        }

        let updated = self.repository.update(&record, &dump(&execution), opts)?;
        Ok(DriverOutcome {
            execution: stash_record(execution, &updated),
            record: updated,
        })
    }

    fn resume(&self, record: &WorkflowRecord, context: Context) -> Result<Execution, DriverError> {
        let execution = restore(
            self.chart.clone(),
            self.callbacks.clone(),
            context,
            &record_dump(&self.chart, record),
        )?;
        Ok(stash_record(execution, record))
    }
}

/// The dump encoded by a persisted record, completed with chart metadata.
fn record_dump(chart: &Chart, record: &WorkflowRecord) -> Dump {
    Dump {
        name: record.name.clone(),
        state: record.state.clone(),
        complete: record.complete,
        participants: chart.participants().to_vec(),
        participant_ids: serde_json::Map::new(),
        subject_key: chart.subject().map(|s| s.key.clone()),
        steps: record
            .steps
            .iter()
            .map(|step| StepDump {
                state: step.state.clone(),
                order: step.order,
                name: step.name.clone(),
                complete: step.complete,
                decision: step.decision.clone(),
                participant: step.participant.clone(),
            })
            .collect(),
    }
}

fn stash_record(mut execution: Execution, record: &WorkflowRecord) -> Execution {
    let meta = execution.meta_mut();
    meta.insert("workflow_id".into(), serde_json::json!(record.id));
    meta.insert("lock_version".into(), serde_json::json!(record.lock_version));
    execution
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::builder::{ChartBuilder, StepOpts, TransitionOpts};
    use crate::execution::{ActionOutcome, NoopCallbacks};
    use crate::persistence::InMemoryRepository;

    fn sale_chart() -> Arc<Chart> {
        Arc::new(
            ChartBuilder::new("sale")
                .subject("sale", "Sale")
                .initial("pending")
                .state("pending", |s| s.on("send", "sent"))
                .state("sent", |s| {
                    s.step("close", StepOpts::default())
                        .on_completed("close", "closed")
                })
                .state("closed", |s| s.terminal())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn load_or_create_creates_once_then_resumes() {
        let repository = InMemoryRepository::new();
        let driver = WorkflowDriver::new(&repository, sale_chart(), Arc::new(NoopCallbacks));
        let subject = SubjectId::new("sale", "7");

        let execution = driver.load_or_create(&subject, Context::new()).unwrap();
        assert_eq!(execution.state_name(), "pending");
        assert_eq!(repository.len(), 1);
        assert_eq!(execution.meta().get("lock_version"), Some(&json!(1)));

        // second call resumes the persisted workflow instead of creating
        let again = driver.load_or_create(&subject, Context::new()).unwrap();
        assert_eq!(again.state_name(), "pending");
        assert_eq!(repository.len(), 1);
    }

    #[test]
    fn driven_operations_persist_each_outcome() {
        let repository = InMemoryRepository::new();
        let driver = WorkflowDriver::new(&repository, sale_chart(), Arc::new(NoopCallbacks));
        let subject = SubjectId::new("sale", "7");
        driver.load_or_create(&subject, Context::new()).unwrap();

        let outcome = driver
            .transition(&subject, Context::new(), &Event::named("send"))
            .unwrap();
        assert_eq!(outcome.record.state, "sent");
        assert_eq!(outcome.record.lock_version, 2);

        let opts = UpdateOpts::new().completed_metadata(json!({"by": "seller"}));
        let outcome = driver
            .complete(&subject, Context::new(), "close", &opts)
            .unwrap();
        assert_eq!(outcome.record.state, "closed");
        assert!(outcome.record.complete);
        assert_eq!(outcome.execution.meta().get("lock_version"), Some(&json!(3)));

        let close = outcome
            .record
            .steps
            .iter()
            .find(|s| s.name == "close")
            .unwrap();
        assert_eq!(close.completed_metadata, Some(json!({"by": "seller"})));
    }

    #[test]
    fn driving_an_unknown_subject_fails() {
        let repository = InMemoryRepository::new();
        let driver = WorkflowDriver::new(&repository, sale_chart(), Arc::new(NoopCallbacks));
        let subject = SubjectId::new("sale", "missing");

        let err = driver
            .transition(&subject, Context::new(), &Event::named("send"))
            .unwrap_err();
        assert_eq!(err, DriverError::NotFound(subject));
    }

    #[test]
    fn interpreter_errors_do_not_touch_the_record() {
        let repository = InMemoryRepository::new();
        let driver = WorkflowDriver::new(&repository, sale_chart(), Arc::new(NoopCallbacks));
        let subject = SubjectId::new("sale", "7");
        driver.load_or_create(&subject, Context::new()).unwrap();

        let err = driver
            .transition(&subject, Context::new(), &Event::named("bogus"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Execution(_)));

        let record = repository.load(&subject).unwrap().unwrap();
        assert_eq!(record.state, "pending");
        assert_eq!(record.lock_version, 1);
    }

    struct BrokenActions;

    impl Callbacks for BrokenActions {
        fn action(&self, _tag: &str, _ctx: &Context) -> ActionOutcome {
            ActionOutcome::Fail("downstream unavailable".into())
        }
    }

    #[test]
    fn failed_action_drain_aborts_before_the_update() {
        let chart = Arc::new(
            ChartBuilder::new("sale")
                .subject("sale", "Sale")
                .initial("pending")
                .state("pending", |s| {
                    s.on_with("send", "sent", TransitionOpts::new().action("notify"))
                })
                .state("sent", |s| s.terminal())
                .build()
                .unwrap(),
        );
        let repository = InMemoryRepository::new();
        let driver = WorkflowDriver::new(&repository, chart, Arc::new(BrokenActions));
        let subject = SubjectId::new("sale", "7");
        driver.load_or_create(&subject, Context::new()).unwrap();

        let err = driver
            .transition(&subject, Context::new(), &Event::named("send"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Execution(_)));

        // the record keeps its pre-transition state
        let record = repository.load(&subject).unwrap().unwrap();
        assert_eq!(record.state, "pending");
        assert_eq!(record.lock_version, 1);
    }
}
