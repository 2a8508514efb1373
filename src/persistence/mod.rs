//! The persistence port.
//!
//! Adapters mirror an execution's [`Dump`] into durable storage as a
//! [`WorkflowRecord`] and guard concurrent updates with an optimistic
//! `lock_version` check; the interpreter itself performs no locking. The
//! recommended relational layout is:
//!
//! - `workflows(id, name, state, is_complete, lock_version, created_at,
//!   updated_at)`
//! - `workflow_steps(id, workflow_id, state, name, order, participant,
//!   decision, is_complete, completed_at, completed_metadata, created_at,
//!   updated_at)` with unique `(workflow_id, state, name)` and an index on
//!   `participant`
//! - subjects carry a `workflow_id` foreign key with cascade delete.
//!
//! [`InMemoryRepository`] is the reference implementation used by the test
//! suite and by single-process hosts; SQL adapters implement the same
//! [`WorkflowRepository`] trait and translate [`query::WorkflowFilter`]
//! predicates into `WHERE` clauses.

pub mod driver;
pub mod query;

pub use driver::{DriverError, DriverOutcome, WorkflowDriver};
pub use query::WorkflowFilter;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::dump::Dump;

/// Identity of the host entity a workflow is attached to: the chart's
/// subject key plus the host-side id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId {
    /// Subject key named by the chart binding (e.g. `"sale"`).
    pub key: String,
    /// Host-side identifier of the entity.
    pub id: String,
}

impl SubjectId {
    /// Identify a subject by key and host id.
    pub fn new(key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.key, self.id)
    }
}

/// One persisted step row, identified by `(state, name)` within its record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepRecord {
    pub state: String,
    pub name: String,
    pub order: u32,
    pub participant: Option<String>,
    pub decision: Option<String>,
    pub complete: bool,
    /// Stamped by `update` when the step first becomes complete.
    pub completed_at: Option<DateTime<Utc>>,
    /// Host metadata attached to the completing update.
    pub completed_metadata: Option<Value>,
}

/// The persisted mirror of an execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: Uuid,
    pub name: String,
    /// Dotted path of the current state (the wire form of a state).
    pub state: String,
    pub complete: bool,
    /// Optimistic lock counter, incremented by every `update`.
    pub lock_version: u64,
    pub steps: Vec<WorkflowStepRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Errors surfaced by repository implementations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RepositoryError {
    /// The record was updated concurrently; the caller holds a stale
    /// `lock_version` and must reload before retrying.
    #[error("workflow `{id}` was updated concurrently")]
    Conflict { id: Uuid },

    /// No workflow exists for the subject.
    #[error("no workflow for subject `{0}`")]
    NotFound(SubjectId),

    /// A storage backend failure.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Options attached to an update, applied to steps completed by it.
#[derive(Clone, Debug, Default)]
pub struct UpdateOpts {
    /// Stored as `completed_metadata` on steps that became complete.
    pub completed_metadata: Option<Value>,
}

impl UpdateOpts {
    /// No metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach metadata recorded on steps completed by this update.
    pub fn completed_metadata(mut self, metadata: Value) -> Self {
        self.completed_metadata = Some(metadata);
        self
    }
}

/// Storage port consumed by adapters.
///
/// `update` must run inside a transaction on transactional backends so that
/// actions performed under the same transaction roll back together with the
/// record on conflict.
pub trait WorkflowRepository: Send + Sync {
    /// Load the workflow attached to a subject, if one exists.
    fn load(&self, subject: &SubjectId) -> Result<Option<WorkflowRecord>, RepositoryError>;

    /// Create a workflow for a subject from a fresh dump.
    fn create(&self, subject: &SubjectId, dump: &Dump) -> Result<WorkflowRecord, RepositoryError>;

    /// Write a dump back over an existing record, incrementing
    /// `lock_version` and stamping newly completed steps.
    fn update(
        &self,
        record: &WorkflowRecord,
        dump: &Dump,
        opts: &UpdateOpts,
    ) -> Result<WorkflowRecord, RepositoryError>;
}

fn step_records_from_dump(dump: &Dump, now: DateTime<Utc>) -> Vec<WorkflowStepRecord> {
    dump.steps
        .iter()
        .map(|step| WorkflowStepRecord {
            state: step.state.clone(),
            name: step.name.clone(),
            order: step.order,
            participant: step.participant.clone(),
            decision: step.decision.clone(),
            complete: step.complete,
            completed_at: step.complete.then_some(now),
            completed_metadata: None,
        })
        .collect()
}

/// Thread-safe in-memory repository for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: RwLock<HashMap<SubjectId, WorkflowRecord>>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored workflows.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// All records matching a query predicate.
    pub fn find(&self, filter: &WorkflowFilter) -> Vec<WorkflowRecord> {
        let mut matches: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        matches
    }
}

impl WorkflowRepository for InMemoryRepository {
    fn load(&self, subject: &SubjectId) -> Result<Option<WorkflowRecord>, RepositoryError> {
        Ok(self.records.read().get(subject).cloned())
    }

    fn create(&self, subject: &SubjectId, dump: &Dump) -> Result<WorkflowRecord, RepositoryError> {
        let mut records = self.records.write();
        if records.contains_key(subject) {
            return Err(RepositoryError::Backend(format!(
                "subject `{subject}` already has a workflow"
            )));
        }

        let now = Utc::now();
        let record = WorkflowRecord {
            id: Uuid::new_v4(),
            name: dump.name.clone(),
            state: dump.state.clone(),
            complete: dump.complete,
            lock_version: 1,
            steps: step_records_from_dump(dump, now),
            created_at: now,
            updated_at: now,
        };
        records.insert(subject.clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        record: &WorkflowRecord,
        dump: &Dump,
        opts: &UpdateOpts,
    ) -> Result<WorkflowRecord, RepositoryError> {
        let mut records = self.records.write();
        let (subject, stored) = records
            .iter()
            .find(|(_, stored)| stored.id == record.id)
            .map(|(subject, stored)| (subject.clone(), stored.clone()))
            .ok_or_else(|| RepositoryError::Backend(format!("unknown workflow `{}`", record.id)))?;

        if stored.lock_version != record.lock_version {
            return Err(RepositoryError::Conflict { id: record.id });
        }

        let now = Utc::now();
        let steps = dump
            .steps
            .iter()
            .map(|step| {
                let previous = stored
                    .steps
                    .iter()
                    .find(|s| s.state == step.state && s.name == step.name);
                let (completed_at, completed_metadata) = match (previous, step.complete) {
                    (Some(p), true) if p.complete => {
                        (p.completed_at, p.completed_metadata.clone())
                    }
                    (_, true) => (Some(now), opts.completed_metadata.clone()),
                    (_, false) => (None, None),
                };
                WorkflowStepRecord {
                    state: step.state.clone(),
                    name: step.name.clone(),
                    order: step.order,
                    participant: step.participant.clone(),
                    decision: step.decision.clone(),
                    complete: step.complete,
                    completed_at,
                    completed_metadata,
                }
            })
            .collect();

        let updated = WorkflowRecord {
            id: stored.id,
            name: stored.name,
            state: dump.state.clone(),
            complete: dump.complete,
            lock_version: stored.lock_version + 1,
            steps,
            created_at: stored.created_at,
            updated_at: now,
        };
        records.insert(subject, updated.clone());
        Ok(updated)
    }
}
