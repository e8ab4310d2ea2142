use crate::errors::PairError;
use crate::model::{JobOp, Status};
use crate::scheduler::SchedulerId;
use std::collections::BTreeMap;

/// Final state of one pair after a pass, including anything that went
/// wrong with it along the way.
#[derive(Debug)]
pub struct PairOutcome {
    pub pair: JobOp,
    pub status: Status,
    pub error: Option<PairError>,
}

/// One bundle accepted by the scheduler during this pass.
#[derive(Debug, Clone)]
pub struct SubmittedBundle {
    pub label: String,
    pub scheduler_id: SchedulerId,
    pub pairs: Vec<JobOp>,
}

/// A bundle script that was rendered but deliberately not submitted.
#[derive(Debug, Clone)]
pub struct RenderedScript {
    pub label: String,
    pub pairs: Vec<JobOp>,
    pub text: String,
}

/// Everything one reconciliation pass did and observed. Outcomes are
/// job-major, operations in topological order within each job.
#[derive(Debug)]
pub struct PassReport {
    pub outcomes: Vec<PairOutcome>,
    pub submitted: Vec<SubmittedBundle>,
    pub scripts: Vec<RenderedScript>,
    /// Stale submission records dropped during this pass.
    pub pruned: Vec<JobOp>,
    /// Set when the scheduler could not be queried; statuses of recorded
    /// pairs are then conservative.
    pub degraded: Option<String>,
    /// True when an abort request stopped the pass between bundles.
    pub aborted: bool,
}

impl PassReport {
    pub fn counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            *counts.entry(outcome.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn outcome(&self, pair: &JobOp) -> Option<&PairOutcome> {
        self.outcomes.iter().find(|o| o.pair == *pair)
    }

    pub fn status(&self, pair: &JobOp) -> Option<Status> {
        self.outcome(pair).map(|o| o.status)
    }

    /// Pairs submitted during this pass, across all bundles.
    pub fn submitted_pairs(&self) -> usize {
        self.submitted.iter().map(|b| b.pairs.len()).sum()
    }

    pub fn errors(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobId, OpName};

    fn outcome(op: &str, job: &str, status: Status) -> PairOutcome {
        PairOutcome {
            pair: JobOp::new(OpName(op.to_string()), JobId(job.to_string())),
            status,
            error: None,
        }
    }

    #[test]
    fn test_counts_groups_by_status() {
        let report = PassReport {
            outcomes: vec![
                outcome("a", "j1", Status::Completed),
                outcome("a", "j2", Status::Eligible),
                outcome("b", "j1", Status::Eligible),
            ],
            submitted: vec![],
            scripts: vec![],
            pruned: vec![],
            degraded: None,
            aborted: false,
        };
        let counts = report.counts();
        assert_eq!(counts[&Status::Completed], 1);
        assert_eq!(counts[&Status::Eligible], 2);
    }

    #[test]
    fn test_submitted_pairs_sums_bundles() {
        let report = PassReport {
            outcomes: vec![],
            submitted: vec![
                SubmittedBundle {
                    label: "x".into(),
                    scheduler_id: SchedulerId("1".into()),
                    pairs: vec![
                        JobOp::new(OpName("a".into()), JobId("j1".into())),
                        JobOp::new(OpName("a".into()), JobId("j2".into())),
                    ],
                },
                SubmittedBundle {
                    label: "y".into(),
                    scheduler_id: SchedulerId("2".into()),
                    pairs: vec![JobOp::new(OpName("a".into()), JobId("j3".into()))],
                },
            ],
            scripts: vec![],
            pruned: vec![],
            degraded: None,
            aborted: false,
        };
        assert_eq!(report.submitted_pairs(), 3);
    }
}
