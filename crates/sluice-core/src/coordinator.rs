//! The submission coordinator.
//!
//! One reconciliation pass is: query the scheduler once, derive every
//! pair's status, prune stale records, select what may go out, bundle it,
//! and submit bundle by bundle. A pass never blocks on running work and
//! never submits a pair twice; invoking it repeatedly is how a project
//! converges.

use crate::errors::{PairError, PassError};
use crate::graph::OperationGraph;
use crate::model::{Bundle, JobId, JobOp, OpName, Status, TaskSpec};
use crate::records::{RecordStore, SubmissionRecord};
use crate::render::ScriptRenderer;
use crate::report::{PairOutcome, PassReport, RenderedScript, SubmittedBundle};
use crate::scheduler::Scheduler;
use crate::status::{self, SchedulerSnapshot, StatusTable};
use crate::store::JobStore;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct PassOptions {
    /// Pairs per bundle; 0 submits everything eligible as one bundle.
    pub bundle_size: usize,
    /// Allow different operations to share a bundle.
    pub parallel_ops: bool,
    /// Cap on selected pairs for this pass.
    pub num: Option<usize>,
    /// Render scripts but do not submit or record anything.
    pub pretend: bool,
    /// Prefix of generated bundle labels, normally the project name.
    pub label_prefix: String,
    /// Restrict selection to these operations.
    pub op_filter: Option<BTreeSet<OpName>>,
    /// Restrict selection to these jobs.
    pub job_filter: Option<BTreeSet<JobId>>,
    /// Checked between bundles; set by the Ctrl-C handler.
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for PassOptions {
    fn default() -> Self {
        PassOptions {
            bundle_size: 1,
            parallel_ops: false,
            num: None,
            pretend: false,
            label_prefix: "sluice".to_string(),
            op_filter: None,
            job_filter: None,
            abort: None,
        }
    }
}

impl PassOptions {
    fn abort_requested(&self) -> bool {
        self.abort
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

/// Derives the full status table for the project and prunes stale
/// submission records. This is the read-only half of a pass; `status`,
/// `next` and `run` stop here.
pub fn fetch_status(
    store: &dyn JobStore,
    graph: &OperationGraph,
    scheduler: &dyn Scheduler,
    records: &mut RecordStore,
) -> Result<StatusTable, PassError> {
    let jobs = store.jobs()?;
    let snapshot = SchedulerSnapshot::fetch(scheduler, records);
    let table = status::reconcile(store, graph, jobs, records, &snapshot);
    if !table.stale.is_empty() {
        for pair in &table.stale {
            records.remove(pair);
            tracing::info!(pair = %pair, "pruned stale submission record");
        }
        records.save()?;
    }
    Ok(table)
}

/// Picks the pairs that may be submitted right now: status `Eligible`,
/// no submission record, and every ancestor operation completed for the
/// same job. Operations are visited in topological order and jobs in id
/// order, so the result is deterministic; `num` truncates it.
pub fn select_pairs(
    table: &StatusTable,
    graph: &OperationGraph,
    opts: &PassOptions,
) -> Vec<JobOp> {
    let mut selected = Vec::new();
    for op in graph.in_order() {
        if let Some(filter) = &opts.op_filter {
            if !filter.contains(&op.name) {
                continue;
            }
        }
        let ancestors: Vec<&OpName> = graph.ancestors_of(&op.name).map(|a| &a.name).collect();
        for job in &table.jobs {
            if let Some(filter) = &opts.job_filter {
                if !filter.contains(job) {
                    continue;
                }
            }
            let pair = JobOp::new(op.name.clone(), job.clone());
            if table.status(&pair) != Some(Status::Eligible) {
                continue;
            }
            let withheld = ancestors.iter().any(|ancestor| {
                table.status(&JobOp::new((*ancestor).clone(), job.clone()))
                    != Some(Status::Completed)
            });
            if withheld {
                tracing::debug!(pair = %pair, "withheld: predecessor not completed");
                continue;
            }
            selected.push(pair);
        }
    }
    if let Some(cap) = opts.num {
        selected.truncate(cap);
    }
    selected
}

/// Splits the selection into bundles of at most `bundle_size` pairs
/// (0 meaning unbounded). Without `parallel_ops`, bundles never mix
/// operations; the selection arrives operation-major, so grouping
/// contiguous runs is enough.
pub fn partition(pairs: Vec<JobOp>, bundle_size: usize, parallel_ops: bool) -> Vec<Vec<JobOp>> {
    fn chunk(list: &[JobOp], bundle_size: usize) -> Vec<Vec<JobOp>> {
        if list.is_empty() {
            return Vec::new();
        }
        if bundle_size == 0 {
            return vec![list.to_vec()];
        }
        list.chunks(bundle_size).map(|c| c.to_vec()).collect()
    }

    if parallel_ops {
        return chunk(&pairs, bundle_size);
    }

    let mut bundles = Vec::new();
    let mut run: Vec<JobOp> = Vec::new();
    for pair in pairs {
        if run.last().is_some_and(|prev| prev.op != pair.op) {
            bundles.extend(chunk(&run, bundle_size));
            run.clear();
        }
        run.push(pair);
    }
    bundles.extend(chunk(&run, bundle_size));
    bundles
}

fn bundle_label(prefix: &str, tasks: &[TaskSpec]) -> String {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let ops: BTreeSet<&OpName> = tasks.iter().map(|t| &t.pair.op).collect();
    if ops.len() == 1 {
        format!("{}-{}-{}", prefix, tasks[0].pair.op, &tag[..8])
    } else {
        format!("{}-bundle-{}", prefix, &tag[..8])
    }
}

/// Runs one full reconciliation pass and reports what happened. Only
/// infrastructure failures (the store, the record file) abort the pass;
/// anything scoped to a pair or a bundle is reported and isolated.
pub fn run_pass(
    store: &dyn JobStore,
    graph: &OperationGraph,
    scheduler: &dyn Scheduler,
    renderer: &dyn ScriptRenderer,
    records: &mut RecordStore,
    opts: &PassOptions,
) -> Result<PassReport, PassError> {
    let mut table = fetch_status(store, graph, scheduler, records)?;
    let selected = select_pairs(&table, graph, opts);
    let bundles = partition(selected, opts.bundle_size, opts.parallel_ops);
    tracing::debug!(
        bundles = bundles.len(),
        degraded = table.degraded.is_some(),
        "selection complete"
    );

    let mut submitted = Vec::new();
    let mut scripts = Vec::new();
    let mut pair_errors: HashMap<JobOp, PairError> = HashMap::new();
    let mut aborted = false;

    for members in bundles {
        if opts.abort_requested() {
            tracing::info!("abort requested; stopping between bundles");
            aborted = true;
            break;
        }

        // Conditions were evaluated before bundling; reload the record
        // file and re-verify each member immediately before the bundle
        // goes out, so a pair recorded meanwhile by a concurrent pass is
        // dropped here instead of going out twice.
        records.refresh()?;
        let mut tasks = Vec::new();
        for pair in members {
            if records.contains(&pair) {
                tracing::debug!(pair = %pair, "already recorded; dropped from bundle");
                continue;
            }
            let Some(op) = graph.get(&pair.op) else {
                continue;
            };
            match store.workspace(&pair.job) {
                Ok(workspace) => tasks.push(TaskSpec {
                    command: op.command_for(&pair.job, &workspace),
                    pair,
                    workspace,
                }),
                Err(e) => {
                    tracing::warn!(pair = %pair, error = %e, "job vanished before submission");
                    pair_errors.insert(pair.clone(), PairError::Vanished { pair });
                }
            }
        }
        if tasks.is_empty() {
            continue;
        }

        let mut directives = graph
            .get(&tasks[0].pair.op)
            .map(|op| op.directives.clone())
            .unwrap_or_default();
        for task in &tasks[1..] {
            if let Some(op) = graph.get(&task.pair.op) {
                directives.absorb(&op.directives);
            }
        }

        let label = bundle_label(&opts.label_prefix, &tasks);
        let bundle = Bundle {
            label: label.clone(),
            tasks,
            directives,
        };
        let script = renderer.render(&bundle);

        if opts.pretend {
            scripts.push(RenderedScript {
                label,
                pairs: bundle.tasks.iter().map(|t| t.pair.clone()).collect(),
                text: script,
            });
            continue;
        }

        match scheduler.submit(&bundle, &script) {
            Ok(id) => {
                let now = chrono::Utc::now();
                let submitted_by =
                    whoami::username().unwrap_or_else(|_| "unknown".to_string());
                for task in &bundle.tasks {
                    records.insert(
                        task.pair.clone(),
                        SubmissionRecord {
                            scheduler_id: id.clone(),
                            scheduler: scheduler.name().to_string(),
                            bundle: label.clone(),
                            submitted_at: now,
                            submitted_by: submitted_by.clone(),
                        },
                    );
                    table.set_status(task.pair.clone(), Status::Queued);
                }
                // Persist before the next bundle so an abort or crash
                // between bundles cannot orphan this submission.
                records.save()?;
                tracing::info!(bundle = %label, id = %id, pairs = bundle.tasks.len(), "bundle submitted");
                submitted.push(SubmittedBundle {
                    label,
                    scheduler_id: id,
                    pairs: bundle.tasks.iter().map(|t| t.pair.clone()).collect(),
                });
            }
            Err(e) => {
                tracing::warn!(bundle = %label, error = %e, "bundle submission failed");
                let reason = e.to_string();
                for task in &bundle.tasks {
                    pair_errors.insert(
                        task.pair.clone(),
                        PairError::Submit {
                            pair: task.pair.clone(),
                            bundle: label.clone(),
                            reason: reason.clone(),
                        },
                    );
                }
            }
        }
    }

    for eval_error in std::mem::take(&mut table.errors) {
        let pair = JobOp::new(eval_error.op.clone(), eval_error.job.clone());
        pair_errors.insert(pair, PairError::Eval(eval_error));
    }

    let mut outcomes = Vec::new();
    for job in &table.jobs {
        for op in graph.in_order() {
            let pair = JobOp::new(op.name.clone(), job.clone());
            if let Some(status) = table.status(&pair) {
                outcomes.push(PairOutcome {
                    status,
                    error: pair_errors.remove(&pair),
                    pair,
                });
            }
        }
    }

    Ok(PassReport {
        outcomes,
        submitted,
        scripts,
        pruned: table.stale.clone(),
        degraded: table.degraded.clone(),
        aborted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobId, OpName};

    fn pair(op: &str, job: &str) -> JobOp {
        JobOp::new(OpName(op.to_string()), JobId(job.to_string()))
    }

    #[test]
    fn test_partition_splits_into_even_chunks_with_remainder() {
        let pairs = vec![
            pair("a", "j1"),
            pair("a", "j2"),
            pair("a", "j3"),
            pair("a", "j4"),
            pair("a", "j5"),
        ];
        let bundles = partition(pairs, 2, false);
        let sizes: Vec<usize> = bundles.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_partition_zero_means_one_bundle() {
        let pairs = vec![pair("a", "j1"), pair("a", "j2"), pair("a", "j3")];
        let bundles = partition(pairs, 0, false);
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].len(), 3);
    }

    #[test]
    fn test_partition_does_not_mix_operations_by_default() {
        let pairs = vec![pair("a", "j1"), pair("a", "j2"), pair("b", "j1")];
        let bundles = partition(pairs, 0, false);
        assert_eq!(bundles.len(), 2);
        assert!(bundles[0].iter().all(|p| p.op.0 == "a"));
        assert!(bundles[1].iter().all(|p| p.op.0 == "b"));
    }

    #[test]
    fn test_partition_mixes_operations_when_asked() {
        let pairs = vec![pair("a", "j1"), pair("b", "j1"), pair("c", "j1")];
        let bundles = partition(pairs, 0, true);
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].len(), 3);
    }

    #[test]
    fn test_partition_chunks_within_each_operation() {
        let pairs = vec![
            pair("a", "j1"),
            pair("a", "j2"),
            pair("a", "j3"),
            pair("b", "j1"),
        ];
        let bundles = partition(pairs, 2, false);
        let sizes: Vec<usize> = bundles.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
    }

    #[test]
    fn test_partition_empty_selection_yields_no_bundles() {
        assert!(partition(Vec::new(), 2, false).is_empty());
        assert!(partition(Vec::new(), 0, true).is_empty());
    }
}
