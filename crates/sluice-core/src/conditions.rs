//! The condition language of `sluice.toml`.
//!
//! Conditions are declarative data rather than callbacks. That keeps the
//! project file self-contained and makes conditions structurally
//! comparable, which is what dependency inference between operations is
//! built on.

use crate::errors::{ConditionError, EvalError};
use crate::model::{JobId, LabelDef, OpName};
use crate::store::JobStore;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    /// Holds for every job.
    Always,
    /// Holds for no job.
    Never,
    /// A path relative to the job workspace exists.
    FileExists(String),
    /// A path relative to the job workspace does not exist.
    FileMissing(String),
    /// A job document key is present and truthy.
    DocFlag(String),
    /// A job document key equals a literal value.
    DocEquals { key: String, value: serde_json::Value },
}

impl Condition {
    pub fn holds(&self, store: &dyn JobStore, job: &JobId) -> Result<bool, ConditionError> {
        match self {
            Condition::Always => Ok(true),
            Condition::Never => Ok(false),
            Condition::FileExists(rel) => {
                let path = store.workspace(job)?.join(rel);
                file_present(&path)
            }
            Condition::FileMissing(rel) => {
                let path = store.workspace(job)?.join(rel);
                Ok(!file_present(&path)?)
            }
            Condition::DocFlag(key) => Ok(truthy(store.get(job, key)?.as_ref())),
            Condition::DocEquals { key, value } => {
                Ok(store.get(job, key)?.map_or(false, |found| found == *value))
            }
        }
    }
}

fn file_present(path: &Path) -> Result<bool, ConditionError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ConditionError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// Mirrors the truthiness rules simulation scripts rely on when they flip
// document flags: absent keys, null, false, 0, "" and empty containers do
// not count.
fn truthy(value: Option<&serde_json::Value>) -> bool {
    use serde_json::Value;
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Evaluates a condition list conjunctively, short-circuiting on the first
/// miss. A failing evaluation is tagged with the pair and the index of the
/// offending condition.
pub fn all_hold(
    store: &dyn JobStore,
    job: &JobId,
    op: &OpName,
    conditions: &[Condition],
) -> Result<bool, EvalError> {
    for (index, condition) in conditions.iter().enumerate() {
        match condition.holds(store, job) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(source) => {
                return Err(EvalError {
                    job: job.clone(),
                    op: op.clone(),
                    index,
                    source,
                })
            }
        }
    }
    Ok(true)
}

/// Collects the labels that hold for a job. Labels are cosmetic, so an
/// evaluation failure only drops the affected label with a warning instead
/// of failing the whole status sweep.
pub fn classify(store: &dyn JobStore, job: &JobId, labels: &[LabelDef]) -> Vec<String> {
    let mut found = Vec::new();
    'labels: for label in labels {
        for condition in &label.when {
            match condition.holds(store, job) {
                Ok(true) => {}
                Ok(false) => continue 'labels,
                Err(e) => {
                    tracing::warn!(job = %job, label = %label.name, error = %e, "skipping label");
                    continue 'labels;
                }
            }
        }
        found.push(label.name.clone());
    }
    found
}
