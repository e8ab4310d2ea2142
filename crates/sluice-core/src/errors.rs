use crate::model::{JobId, JobOp, OpName};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to serialize TOML configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("XDG Base Directory Error: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),

    #[error("Invalid configuration: {0}")]
    General(String),

    #[error("No project found at '{0}'.\nRun this command inside a sluice project, or point at one with --project. A project is any directory containing a 'sluice.toml' file.")]
    ProjectNotFound(PathBuf),

    #[error("A project already exists at '{0}'.")]
    ProjectExists(PathBuf),

    #[error("Operation '{op}' has an invalid name. Names may contain letters, digits, '_', '-' and '.', and must not start with '-' or '.'.")]
    InvalidOperationName { op: String },

    #[error("Operation '{op}' has an empty command.")]
    EmptyCommand { op: OpName },

    #[error("Label '{0}' is defined more than once.")]
    DuplicateLabel(String),

    #[error("Unknown scheduler kind '{0}'. Expected 'slurm' or 'shell'.")]
    UnknownScheduler(String),

    #[error("Could not determine HOME directory.")]
    HomeDirectoryNotFound,
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Operation '{0}' is defined more than once.")]
    DuplicateOperation(OpName),

    #[error("Operation '{op}' lists unknown predecessor '{predecessor}'. Every name in 'after' must be a defined operation.")]
    UnknownPredecessor { op: OpName, predecessor: OpName },

    #[error("Operation '{0}' lists itself as a predecessor.")]
    SelfReference(OpName),

    #[error("The operation graph contains a dependency cycle through '{0}'. Remove one of the 'after' entries (or disable dependency inference) to break the cycle.")]
    Cycle(OpName),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path '{path}': {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document of job '{job}': {source}")]
    Document {
        job: JobId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse statepoint of job '{job}': {source}")]
    Statepoint {
        job: JobId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state for job '{job}': {source}")]
    Serialize {
        job: JobId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job '{0}' not found in the workspace.")]
    JobNotFound(JobId),

    #[error("Workspace directory '{0}' does not exist. Initialize jobs first.")]
    WorkspaceNotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum ConditionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error inspecting '{path}': {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A condition of an operation could not be evaluated for a job. The
/// affected pair is reported with [`crate::model::Status::Error`]; other
/// pairs are unaffected.
#[derive(Error, Debug)]
#[error("Condition {index} of operation '{op}' failed for job '{job}': {source}")]
pub struct EvalError {
    pub job: JobId,
    pub op: OpName,
    pub index: usize,
    #[source]
    pub source: ConditionError,
}

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Scheduler '{scheduler}' is unavailable: {reason}")]
    Unavailable { scheduler: String, reason: String },

    #[error("Scheduler '{scheduler}' rejected the submission: {reason}")]
    Rejected { scheduler: String, reason: String },

    #[error("Could not parse a scheduler id from submission output: '{0}'")]
    IdParse(String),

    #[error("I/O error on script '{path}': {source}")]
    ScriptIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal error of a reconciliation pass. Per-pair trouble (evaluation
/// failures, rejected bundles) never surfaces here; it is carried inside
/// the pass report instead.
#[derive(Error, Debug)]
pub enum PassError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum PairError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Submission of bundle '{bundle}' failed: {reason}")]
    Submit { pair: JobOp, bundle: String, reason: String },

    #[error("Job of pair '{pair}' vanished from the workspace before submission.")]
    Vanished { pair: JobOp },
}
