use crate::errors::StoreError;
use crate::model::JobId;
use std::path::PathBuf;

/// Access to the job set and the per-job state the condition language
/// reads. The engine only ever goes through this trait; the filesystem
/// layout behind it lives in `sluice-store`.
///
/// Implementations must be usable from the parallel status sweep, hence
/// the `Send + Sync` bound.
pub trait JobStore: Send + Sync {
    /// Every job currently in the workspace, sorted by id. The engine
    /// relies on this order for deterministic pair enumeration.
    fn jobs(&self) -> Result<Vec<JobId>, StoreError>;

    fn contains(&self, job: &JobId) -> Result<bool, StoreError>;

    /// Reads one key of the job document. Absent documents and absent
    /// keys both read as `None`; a document that exists but cannot be
    /// parsed is an error.
    fn get(&self, job: &JobId, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Writes one key of the job document, creating the document if
    /// needed.
    fn set(&self, job: &JobId, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    /// The workspace directory of the job. Errors if the job is gone.
    fn workspace(&self, job: &JobId) -> Result<PathBuf, StoreError>;
}
