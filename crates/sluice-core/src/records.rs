//! Persistent submission records.
//!
//! One record per pair that currently has a live scheduler submission.
//! The file is the only state sluice keeps besides the workspace itself;
//! deleting it is safe in the worst case (duplicate submissions of
//! still-pending work) but never loses results. Several passes may share
//! the file (two users on one cluster submit the same project), so saves
//! merge with the on-disk state instead of overwriting it.

use crate::constants::files;
use crate::errors::ConfigError;
use crate::model::JobOp;
use crate::scheduler::SchedulerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionRecord {
    pub scheduler_id: SchedulerId,
    pub scheduler: String,
    pub bundle: String,
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: String,
}

pub struct RecordStore {
    path: PathBuf,
    records: HashMap<JobOp, SubmissionRecord>,
    /// Pairs this store has inserted or removed since it read the file.
    /// `refresh` and `save` keep these decisions over what the file says;
    /// everything else mirrors the disk.
    inserted: HashSet<JobOp>,
    removed: HashMap<JobOp, SchedulerId>,
}

impl RecordStore {
    /// Loads the records of a project from its state directory. A missing
    /// file is an empty store; an unreadable or corrupt file is an error,
    /// because records are what prevents double submission.
    pub fn open(state_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir.join(files::RECORDS);
        let records = Self::read(&path)?;
        Ok(RecordStore {
            path,
            records,
            inserted: HashSet::new(),
            removed: HashMap::new(),
        })
    }

    fn read(path: &Path) -> Result<HashMap<JobOp, SubmissionRecord>, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let raw: HashMap<String, SubmissionRecord> = serde_json::from_str(&content)?;
                let mut records = HashMap::with_capacity(raw.len());
                for (key, record) in raw {
                    let pair = JobOp::from_str(&key).map_err(|e| {
                        ConfigError::General(format!(
                            "Corrupt record key in '{}': {}",
                            path.display(),
                            e
                        ))
                    })?;
                    records.insert(pair, record);
                }
                Ok(records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(source) => Err(ConfigError::PathIo {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Re-reads the record file and folds in whatever other processes
    /// persisted since this store last read it. Pairs this store inserted
    /// or removed keep the local decision; a removal only suppresses the
    /// exact submission it pruned, so a pair re-submitted elsewhere in
    /// the meantime shows up with its new record.
    pub fn refresh(&mut self) -> Result<(), ConfigError> {
        let disk = Self::read(&self.path)?;
        let inserted = &self.inserted;
        self.records
            .retain(|pair, _| inserted.contains(pair) || disk.contains_key(pair));
        for (pair, record) in disk {
            if self.inserted.contains(&pair)
                || self.removed.get(&pair) == Some(&record.scheduler_id)
            {
                continue;
            }
            self.records.insert(pair, record);
        }
        Ok(())
    }

    /// Merges the on-disk state (another pass may have saved since we
    /// read the file), then writes the union back via a sibling temp file
    /// and a rename so a crash mid-write cannot leave a torn file behind.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        self.refresh()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::PathIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        // BTreeMap keyed by the pair string keeps the file diff-friendly.
        let raw: BTreeMap<String, &SubmissionRecord> = self
            .records
            .iter()
            .map(|(pair, record)| (pair.to_string(), record))
            .collect();
        let json = serde_json::to_string_pretty(&raw)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| ConfigError::PathIo {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| ConfigError::PathIo {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    pub fn get(&self, pair: &JobOp) -> Option<&SubmissionRecord> {
        self.records.get(pair)
    }

    pub fn contains(&self, pair: &JobOp) -> bool {
        self.records.contains_key(pair)
    }

    pub fn insert(&mut self, pair: JobOp, record: SubmissionRecord) {
        self.removed.remove(&pair);
        self.inserted.insert(pair.clone());
        self.records.insert(pair, record);
    }

    pub fn remove(&mut self, pair: &JobOp) -> Option<SubmissionRecord> {
        let record = self.records.remove(pair);
        if let Some(record) = &record {
            self.inserted.remove(pair);
            self.removed.insert(pair.clone(), record.scheduler_id.clone());
        }
        record
    }

    /// The distinct scheduler ids referenced by any record. Bundled
    /// submissions share one id, so this is usually shorter than the
    /// record count.
    pub fn scheduler_ids(&self) -> BTreeSet<SchedulerId> {
        self.records
            .values()
            .map(|r| r.scheduler_id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobOp, &SubmissionRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobId, OpName};

    fn record(id: &str) -> SubmissionRecord {
        SubmissionRecord {
            scheduler_id: SchedulerId(id.to_string()),
            scheduler: "shell".to_string(),
            bundle: "test-bundle".to_string(),
            submitted_at: Utc::now(),
            submitted_by: "tester".to_string(),
        }
    }

    fn pair(op: &str, job: &str) -> JobOp {
        JobOp::new(OpName(op.to_string()), JobId(job.to_string()))
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reopen_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).unwrap();
        store.insert(pair("melt", "j1"), record("101"));
        store.insert(pair("melt", "j2"), record("101"));
        store.save().unwrap();

        let reopened = RecordStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.get(&pair("melt", "j1")).unwrap().scheduler_id,
            SchedulerId("101".to_string())
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(files::RECORDS), "{ not json").unwrap();
        assert!(RecordStore::open(dir.path()).is_err());
    }

    #[test]
    fn test_scheduler_ids_deduplicate_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).unwrap();
        store.insert(pair("melt", "j1"), record("7"));
        store.insert(pair("melt", "j2"), record("7"));
        store.insert(pair("cool", "j1"), record("9"));
        let ids = store.scheduler_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&SchedulerId("7".to_string())));
        assert!(ids.contains(&SchedulerId("9".to_string())));
    }

    #[test]
    fn test_refresh_adopts_records_saved_by_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut ours = RecordStore::open(dir.path()).unwrap();
        let mut theirs = RecordStore::open(dir.path()).unwrap();

        theirs.insert(pair("melt", "j1"), record("101"));
        theirs.save().unwrap();

        assert!(!ours.contains(&pair("melt", "j1")));
        ours.refresh().unwrap();
        assert!(ours.contains(&pair("melt", "j1")));
    }

    #[test]
    fn test_save_keeps_records_written_by_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut ours = RecordStore::open(dir.path()).unwrap();
        let mut theirs = RecordStore::open(dir.path()).unwrap();

        theirs.insert(pair("melt", "j1"), record("101"));
        theirs.save().unwrap();
        ours.insert(pair("melt", "j2"), record("202"));
        ours.save().unwrap();

        let reopened = RecordStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.get(&pair("melt", "j1")).unwrap().scheduler_id,
            SchedulerId("101".to_string())
        );
        assert_eq!(
            reopened.get(&pair("melt", "j2")).unwrap().scheduler_id,
            SchedulerId("202".to_string())
        );
    }

    #[test]
    fn test_save_does_not_resurrect_a_pruned_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordStore::open(dir.path()).unwrap();
        writer.insert(pair("melt", "j1"), record("101"));
        writer.save().unwrap();

        let mut ours = RecordStore::open(dir.path()).unwrap();
        ours.remove(&pair("melt", "j1"));
        ours.save().unwrap();

        let reopened = RecordStore::open(dir.path()).unwrap();
        assert!(!reopened.contains(&pair("melt", "j1")));
    }

    #[test]
    fn test_pruning_yields_to_a_newer_submission_of_the_same_pair() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordStore::open(dir.path()).unwrap();
        writer.insert(pair("melt", "j1"), record("101"));
        writer.save().unwrap();

        // We prune the stale 101 while another pass replaces it with 102.
        let mut ours = RecordStore::open(dir.path()).unwrap();
        let mut theirs = RecordStore::open(dir.path()).unwrap();
        ours.remove(&pair("melt", "j1"));
        theirs.remove(&pair("melt", "j1"));
        theirs.insert(pair("melt", "j1"), record("102"));
        theirs.save().unwrap();

        ours.save().unwrap();
        let reopened = RecordStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(&pair("melt", "j1")).unwrap().scheduler_id,
            SchedulerId("102".to_string())
        );
    }
}
