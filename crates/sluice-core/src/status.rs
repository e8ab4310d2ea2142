//! Status reconciliation.
//!
//! A pair's status is derived fresh on every pass from three inputs: the
//! condition state in the workspace, the submission records, and one
//! batched scheduler query. Post-conditions outrank the scheduler: work
//! that is demonstrably done is `Completed` no matter what the queue says.

use crate::conditions::all_hold;
use crate::errors::EvalError;
use crate::graph::OperationGraph;
use crate::model::{JobId, JobOp, OperationDef, Status};
use crate::records::{RecordStore, SubmissionRecord};
use crate::scheduler::{QueueState, Scheduler, SchedulerId};
use crate::store::JobStore;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// The queue as seen by one batched query at the start of a pass.
pub struct SchedulerSnapshot {
    states: HashMap<SchedulerId, QueueState>,
    fault: Option<String>,
}

impl SchedulerSnapshot {
    /// A clean snapshot with no known ids, for projects with no live
    /// records.
    pub fn empty() -> Self {
        SchedulerSnapshot {
            states: HashMap::new(),
            fault: None,
        }
    }

    /// A degraded snapshot: the scheduler could not be reached. Every
    /// recorded id reads as still queued, so nothing is resubmitted or
    /// pruned on stale information.
    pub fn degraded(reason: String) -> Self {
        SchedulerSnapshot {
            states: HashMap::new(),
            fault: Some(reason),
        }
    }

    /// Queries the scheduler once for every distinct recorded id. With no
    /// records the scheduler is not contacted at all. A failed or timed
    /// out query yields a degraded snapshot instead of an error.
    pub fn fetch(scheduler: &dyn Scheduler, records: &RecordStore) -> Self {
        let ids = records.scheduler_ids();
        if ids.is_empty() {
            return Self::empty();
        }
        match scheduler.query(&ids) {
            Ok(states) => SchedulerSnapshot {
                states,
                fault: None,
            },
            Err(e) => {
                tracing::warn!(scheduler = scheduler.name(), error = %e, "scheduler query failed; assuming recorded submissions are still queued");
                Self::degraded(e.to_string())
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fault.is_some()
    }

    pub fn degradation(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// The state of one id. On a degraded snapshot everything reads as
    /// queued; on a clean snapshot, ids the scheduler did not report are
    /// unknown.
    pub fn state(&self, id: &SchedulerId) -> QueueState {
        if self.fault.is_some() {
            return QueueState::Queued;
        }
        self.states
            .get(id)
            .copied()
            .unwrap_or(QueueState::Unknown)
    }
}

/// The derived status of one pair, plus whether its submission record
/// turned out to be stale and should be pruned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: Status,
    pub stale_record: bool,
}

/// Derives the status of one pair. Evaluation order is fixed:
/// post-conditions first, then the recorded submission against the
/// snapshot, then pre-conditions.
///
/// An operation with no post-conditions never reads as completed; it has
/// no way to prove it ran.
pub fn resolve(
    store: &dyn JobStore,
    op: &OperationDef,
    job: &JobId,
    record: Option<&SubmissionRecord>,
    snapshot: &SchedulerSnapshot,
) -> Result<Resolution, EvalError> {
    let stale_record = match record {
        Some(rec) if !snapshot.is_degraded() => matches!(
            snapshot.state(&rec.scheduler_id),
            QueueState::Terminal | QueueState::Unknown
        ),
        _ => false,
    };

    if !op.post.is_empty() && all_hold(store, job, &op.name, &op.post)? {
        return Ok(Resolution {
            status: Status::Completed,
            stale_record,
        });
    }

    if let Some(rec) = record {
        if !stale_record {
            let status = match snapshot.state(&rec.scheduler_id) {
                QueueState::Active => Status::Active,
                _ => Status::Queued,
            };
            return Ok(Resolution {
                status,
                stale_record: false,
            });
        }
        // The scheduler no longer knows this submission and the
        // post-conditions did not come true: the record is stale and the
        // pair falls through to plain condition evaluation.
        tracing::debug!(pair = %JobOp::new(op.name.clone(), job.clone()), id = %rec.scheduler_id, "submission record is stale");
    }

    let status = if all_hold(store, job, &op.name, &op.pre)? {
        Status::Eligible
    } else {
        Status::Ineligible
    };
    Ok(Resolution {
        status,
        stale_record,
    })
}

/// Every pair's status for one pass, in deterministic order: jobs sorted
/// by id, operations in topological order within each job.
pub struct StatusTable {
    pub jobs: Vec<JobId>,
    statuses: HashMap<JobOp, Status>,
    pub errors: Vec<EvalError>,
    /// Pairs whose submission record should be pruned.
    pub stale: Vec<JobOp>,
    pub degraded: Option<String>,
}

impl StatusTable {
    pub fn status(&self, pair: &JobOp) -> Option<Status> {
        self.statuses.get(pair).copied()
    }

    pub fn set_status(&mut self, pair: JobOp, status: Status) {
        self.statuses.insert(pair, status);
    }

    pub fn counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for status in self.statuses.values() {
            *counts.entry(*status).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Resolves every job x operation pair against one snapshot. Jobs are
/// swept in parallel; the result is folded back in job order so the table
/// is identical from run to run.
pub fn reconcile(
    store: &dyn JobStore,
    graph: &OperationGraph,
    jobs: Vec<JobId>,
    records: &RecordStore,
    snapshot: &SchedulerSnapshot,
) -> StatusTable {
    let mut jobs = jobs;
    jobs.sort();

    let per_job: Vec<Vec<(JobOp, Result<Resolution, EvalError>)>> = jobs
        .par_iter()
        .map(|job| {
            graph
                .in_order()
                .map(|op| {
                    let pair = JobOp::new(op.name.clone(), job.clone());
                    let resolution = resolve(store, op, job, records.get(&pair), snapshot);
                    (pair, resolution)
                })
                .collect()
        })
        .collect();

    let mut table = StatusTable {
        jobs,
        statuses: HashMap::new(),
        errors: Vec::new(),
        stale: Vec::new(),
        degraded: snapshot.degradation().map(|s| s.to_string()),
    };

    for (pair, resolution) in per_job.into_iter().flatten() {
        match resolution {
            Ok(res) => {
                if res.stale_record {
                    table.stale.push(pair.clone());
                }
                table.statuses.insert(pair, res.status);
            }
            Err(e) => {
                table.statuses.insert(pair, Status::Error);
                table.errors.push(e);
            }
        }
    }

    table
}
