//! Filesystem-backed job store.
//!
//! One directory per job under the workspace root, named by a digest of
//! the job's statepoint:
//!
//! ```text
//! workspace/
//!   8d2f.../           one job (id = leading hex of the statepoint digest)
//!     statepoint.json  immutable identity, written once at init
//!     document.json    mutable key/value state, written via temp + rename
//! ```
//!
//! The engine only ever sees the `JobStore` trait; everything about this
//! layout is private to this crate.

use sha2::{Digest, Sha256};
use sluice_core::constants::files;
use sluice_core::errors::StoreError;
use sluice_core::model::JobId;
use sluice_core::store::JobStore;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Derives the job id for a statepoint: SHA-256 over the compact JSON
/// form, truncated to 32 hex characters. serde_json serializes object
/// keys in sorted order, so two statepoints with the same content get
/// the same id regardless of how their keys were declared.
pub fn statepoint_digest(statepoint: &serde_json::Value) -> Result<JobId, StoreError> {
    let bytes = serde_json::to_vec(statepoint).map_err(|e| {
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize statepoint: {}", e),
        ))
    })?;
    let digest = format!("{:x}", Sha256::digest(&bytes));
    Ok(JobId(digest[..32].to_string()))
}

pub struct FsJobStore {
    workspace: PathBuf,
}

impl FsJobStore {
    /// Opens an existing workspace directory.
    pub fn open(workspace: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let workspace = workspace.into();
        if !workspace.is_dir() {
            return Err(StoreError::WorkspaceNotFound(workspace));
        }
        Ok(FsJobStore { workspace })
    }

    /// Creates the workspace directory if needed and opens it.
    pub fn init(workspace: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let workspace = workspace.into();
        fs_err::create_dir_all(&workspace)?;
        Ok(FsJobStore { workspace })
    }

    pub fn root(&self) -> &Path {
        &self.workspace
    }

    fn job_dir(&self, job: &JobId) -> PathBuf {
        self.workspace.join(&job.0)
    }

    /// Creates the job directory for a statepoint and returns its id.
    /// Already-initialized jobs are left untouched, so calling this again
    /// with the same statepoint is a no-op.
    pub fn init_job(&self, statepoint: &serde_json::Value) -> Result<JobId, StoreError> {
        let job = statepoint_digest(statepoint)?;
        let dir = self.job_dir(&job);
        fs_err::create_dir_all(&dir)?;
        let path = dir.join(files::STATEPOINT);
        if !path.exists() {
            let json = serde_json::to_string_pretty(statepoint).map_err(|source| {
                StoreError::Serialize {
                    job: job.clone(),
                    source,
                }
            })?;
            fs_err::write(&path, json)?;
            tracing::debug!(job = %job, "Initialized job directory");
        }
        Ok(job)
    }

    /// Reads a job's statepoint back.
    pub fn statepoint(&self, job: &JobId) -> Result<serde_json::Value, StoreError> {
        let path = self.job_dir(job).join(files::STATEPOINT);
        let content = match fs_err::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::JobNotFound(job.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Statepoint {
            job: job.clone(),
            source,
        })
    }

    fn read_document(
        &self,
        job: &JobId,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>, StoreError> {
        let path = self.job_dir(job).join(files::DOCUMENT);
        let content = match fs_err::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc = serde_json::from_str(&content).map_err(|source| StoreError::Document {
            job: job.clone(),
            source,
        })?;
        Ok(Some(doc))
    }

    fn write_document(
        &self,
        job: &JobId,
        doc: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let path = self.job_dir(job).join(files::DOCUMENT);
        let json = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Serialize {
            job: job.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs_err::write(&tmp, json)?;
        fs_err::rename(&tmp, &path)?;
        Ok(())
    }
}

impl JobStore for FsJobStore {
    fn jobs(&self) -> Result<Vec<JobId>, StoreError> {
        if !self.workspace.is_dir() {
            return Err(StoreError::WorkspaceNotFound(self.workspace.clone()));
        }
        // Directories without a statepoint are not jobs; leave them alone.
        let mut jobs: Vec<JobId> = WalkDir::new(&self.workspace)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.path().join(files::STATEPOINT).is_file())
            .filter_map(|e| e.file_name().to_str().map(|n| JobId(n.to_string())))
            .collect();
        jobs.sort();
        Ok(jobs)
    }

    fn contains(&self, job: &JobId) -> Result<bool, StoreError> {
        Ok(self.job_dir(job).join(files::STATEPOINT).is_file())
    }

    fn get(&self, job: &JobId, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.read_document(job)?.and_then(|doc| doc.get(key).cloned()))
    }

    fn set(&self, job: &JobId, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        if !self.contains(job)? {
            return Err(StoreError::JobNotFound(job.clone()));
        }
        let mut doc = self.read_document(job)?.unwrap_or_default();
        doc.insert(key.to_string(), value);
        self.write_document(job, &doc)
    }

    fn workspace(&self, job: &JobId) -> Result<PathBuf, StoreError> {
        let dir = self.job_dir(job);
        if !dir.is_dir() {
            return Err(StoreError::JobNotFound(job.clone()));
        }
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsJobStore) {
        let dir = TempDir::new().unwrap();
        let store = FsJobStore::init(dir.path().join("workspace")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_digest_is_truncated_hex() {
        let id = statepoint_digest(&json!({"temperature": 300})).unwrap();
        assert_eq!(id.0.len(), 32);
        assert!(id.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(statepoint_digest(&a).unwrap(), statepoint_digest(&b).unwrap());
    }

    #[test]
    fn test_init_job_is_idempotent() {
        let (_dir, store) = store();
        let first = store.init_job(&json!({"temperature": 300})).unwrap();
        let second = store.init_job(&json!({"temperature": 300})).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.jobs().unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_statepoints_get_distinct_jobs() {
        let (_dir, store) = store();
        let a = store.init_job(&json!({"temperature": 300})).unwrap();
        let b = store.init_job(&json!({"temperature": 400})).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.jobs().unwrap().len(), 2);
    }

    #[test]
    fn test_statepoint_round_trip() {
        let (_dir, store) = store();
        let sp = json!({"temperature": 300, "pressure": 1.5});
        let job = store.init_job(&sp).unwrap();
        assert_eq!(store.statepoint(&job).unwrap(), sp);
    }

    #[test]
    fn test_jobs_sorted_and_stray_dirs_skipped() {
        let (_dir, store) = store();
        store.init_job(&json!({"n": 1})).unwrap();
        store.init_job(&json!({"n": 2})).unwrap();
        std::fs::create_dir(store.root().join("not-a-job")).unwrap();
        std::fs::write(store.root().join("notes.txt"), "hi").unwrap();

        let jobs = store.jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        let mut sorted = jobs.clone();
        sorted.sort();
        assert_eq!(jobs, sorted);
    }

    #[test]
    fn test_get_without_document_is_none() {
        let (_dir, store) = store();
        let job = store.init_job(&json!({"n": 1})).unwrap();
        assert_eq!(store.get(&job, "done").unwrap(), None);
    }

    #[test]
    fn test_set_then_get_preserves_other_keys() {
        let (_dir, store) = store();
        let job = store.init_job(&json!({"n": 1})).unwrap();
        store.set(&job, "melted", json!(true)).unwrap();
        store.set(&job, "pressure", json!(1.5)).unwrap();
        assert_eq!(store.get(&job, "melted").unwrap(), Some(json!(true)));
        assert_eq!(store.get(&job, "pressure").unwrap(), Some(json!(1.5)));
    }

    #[test]
    fn test_set_on_unknown_job_fails() {
        let (_dir, store) = store();
        let ghost = JobId("00000000000000000000000000000000".to_string());
        assert!(matches!(
            store.set(&ghost, "k", json!(1)),
            Err(StoreError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let (_dir, store) = store();
        let job = store.init_job(&json!({"n": 1})).unwrap();
        std::fs::write(store.workspace(&job).unwrap().join(files::DOCUMENT), "{ not json").unwrap();
        assert!(matches!(
            store.get(&job, "k"),
            Err(StoreError::Document { .. })
        ));
    }

    #[test]
    fn test_open_requires_existing_workspace() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FsJobStore::open(dir.path().join("missing")),
            Err(StoreError::WorkspaceNotFound(_))
        ));
    }

    #[test]
    fn test_workspace_of_vanished_job_fails() {
        let (_dir, store) = store();
        let job = store.init_job(&json!({"n": 1})).unwrap();
        std::fs::remove_dir_all(store.root().join(&job.0)).unwrap();
        assert!(matches!(
            store.workspace(&job),
            Err(StoreError::JobNotFound(_))
        ));
    }
}
