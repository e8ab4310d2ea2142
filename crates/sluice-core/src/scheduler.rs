use crate::errors::SchedError;
use crate::model::Bundle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A scheduler-side identifier for a submitted bundle, opaque to the
/// engine. For SLURM this is the numeric job id as printed by `sbatch`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct SchedulerId(pub String);

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SchedulerId {
    fn from(s: String) -> Self {
        SchedulerId(s)
    }
}

/// What the external queue reports for one scheduler id.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum QueueState {
    /// Accepted but not yet running.
    Queued,
    /// Currently running (or winding down).
    Active,
    /// Finished, in any way the scheduler distinguishes. The engine does
    /// not care how: completion is judged by post-conditions alone.
    Terminal,
    /// The scheduler no longer knows the id. Treated like [`Self::Terminal`]:
    /// the submission record is stale.
    Unknown,
}

/// The submission side of an external batch scheduler.
///
/// Adapters are synchronous; both calls are expected to apply their own
/// timeout and map expiry to [`SchedError::Unavailable`].
pub trait Scheduler {
    /// Short adapter name, recorded with every submission.
    fn name(&self) -> &str;

    /// Hands one rendered bundle to the scheduler and returns its id.
    /// Must not partially succeed: either the bundle is queued under the
    /// returned id or the error describes why nothing was queued.
    fn submit(&self, bundle: &Bundle, script: &str) -> Result<SchedulerId, SchedError>;

    /// Queries the queue state of the given ids in one round trip. Ids
    /// missing from the result are [`QueueState::Unknown`].
    fn query(&self, ids: &BTreeSet<SchedulerId>)
        -> Result<HashMap<SchedulerId, QueueState>, SchedError>;
}
