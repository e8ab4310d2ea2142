use crate::conditions::Condition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JobId {
    pub fn short_id(&self) -> String {
        let s = &self.0;
        if s.len() > 8 {
            s[..8].to_string()
        } else {
            s.to_string()
        }
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}

impl FromStr for JobId {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobId(s.to_string()))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct OpName(pub String);

impl fmt::Display for OpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OpName {
    fn from(s: String) -> Self {
        OpName(s)
    }
}

impl FromStr for OpName {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OpName(s.to_string()))
    }
}

/// One operation applied to one job: the unit everything downstream is
/// keyed by. Statuses, submission records and report entries all refer to
/// pairs, never to bare jobs or bare operations.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct JobOp {
    pub op: OpName,
    pub job: JobId,
}

impl JobOp {
    pub fn new(op: OpName, job: JobId) -> Self {
        JobOp { op, job }
    }
}

impl fmt::Display for JobOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.op, self.job)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobOpError(pub String);

impl fmt::Display for ParseJobOpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid pair key '{}': expected '<operation>/<job>'",
            self.0
        )
    }
}

impl std::error::Error for ParseJobOpError {}

impl FromStr for JobOp {
    type Err = ParseJobOpError;

    // Operation names cannot contain '/', so the first separator is
    // unambiguous even if a job id contains one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((op, job)) if !op.is_empty() && !job.is_empty() => Ok(JobOp {
                op: OpName(op.to_string()),
                job: JobId(job.to_string()),
            }),
            _ => Err(ParseJobOpError(s.to_string())),
        }
    }
}

/// Derived state of one pair at one instant. Recomputed on every pass;
/// never stored.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Completed,
    Active,
    Queued,
    Eligible,
    Ineligible,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Completed => write!(f, "completed"),
            Status::Active => write!(f, "active"),
            Status::Queued => write!(f, "queued"),
            Status::Eligible => write!(f, "eligible"),
            Status::Ineligible => write!(f, "ineligible"),
            Status::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid status: '{}'. Valid values are: completed, active, queued, eligible, ineligible, error",
            self.0
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Status::Completed),
            "active" => Ok(Status::Active),
            "queued" => Ok(Status::Queued),
            "eligible" => Ok(Status::Eligible),
            "ineligible" => Ok(Status::Ineligible),
            "error" => Ok(Status::Error),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

fn default_np() -> u32 {
    1
}

/// Resource requests forwarded to the scheduler. All fields are hints;
/// adapters that cannot honor one ignore it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Directives {
    #[serde(default = "default_np")]
    pub np: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub walltime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub submit_opts: Vec<String>,
}

impl Default for Directives {
    fn default() -> Self {
        Directives {
            np: 1,
            walltime: None,
            memory: None,
            partition: None,
            submit_opts: Vec::new(),
        }
    }
}

impl Directives {
    /// Merges the directives of another bundle member into this set.
    /// Members of a bundle execute serially, so the processor count is a
    /// peak, not a sum; scalar hints keep the first declared value.
    pub fn absorb(&mut self, other: &Directives) {
        self.np = self.np.max(other.np);
        if self.walltime.is_none() {
            self.walltime = other.walltime.clone();
        }
        if self.memory.is_none() {
            self.memory = other.memory.clone();
        }
        if self.partition.is_none() {
            self.partition = other.partition.clone();
        }
        for opt in &other.submit_opts {
            if !self.submit_opts.contains(opt) {
                self.submit_opts.push(opt.clone());
            }
        }
    }
}

/// A named unit of work declared in `sluice.toml`. Conditions are data,
/// not code, so two operations can be compared structurally when inferring
/// dependencies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationDef {
    pub name: OpName,
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<OpName>,

    #[serde(default)]
    pub directives: Directives,
}

impl OperationDef {
    /// Expands the command template for one job. `{job}` and `{job.short}`
    /// expand to the job id, `{workspace}` to the job's workspace
    /// directory.
    pub fn command_for(&self, job: &JobId, workspace: &Path) -> String {
        self.command
            .replace("{job.short}", &job.short_id())
            .replace("{job}", &job.0)
            .replace("{workspace}", &workspace.to_string_lossy())
    }
}

/// A display-only tag: shown next to a job whenever all of its conditions
/// hold. Labels never influence scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<Condition>,
}

/// One pair resolved for execution: the command template is already
/// expanded and the workspace verified to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub pair: JobOp,
    pub command: String,
    pub workspace: std::path::PathBuf,
}

/// A set of tasks submitted to the scheduler as one unit. The scheduler
/// sees a single id per bundle; sluice tracks the member pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub label: String,
    pub tasks: Vec<TaskSpec>,
    pub directives: Directives,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_job_op_roundtrip() {
        let pair = JobOp::new(OpName("mix".into()), JobId("a1b2c3".into()));
        assert_eq!(pair.to_string(), "mix/a1b2c3");
        assert_eq!(JobOp::from_str("mix/a1b2c3").unwrap(), pair);
    }

    #[test]
    fn test_job_op_parse_rejects_bare_name() {
        assert!(JobOp::from_str("mix").is_err());
        assert!(JobOp::from_str("/a1b2c3").is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(Status::from_str("eligible").unwrap(), Status::Eligible);
        assert_eq!(Status::from_str("completed").unwrap(), Status::Completed);
        assert!(Status::from_str("pending").is_err());
    }

    #[test]
    fn test_short_id_truncates() {
        assert_eq!(JobId("0123456789abcdef".into()).short_id(), "01234567");
        assert_eq!(JobId("abc".into()).short_id(), "abc");
    }

    #[test]
    fn test_command_expansion() {
        let op = OperationDef {
            name: OpName("melt".into()),
            command: "python melt.py {workspace} --id {job.short}".into(),
            pre: vec![],
            post: vec![],
            after: vec![],
            directives: Directives::default(),
        };
        let rendered = op.command_for(
            &JobId("0123456789abcdef".into()),
            &PathBuf::from("/tmp/ws/0123456789abcdef"),
        );
        assert_eq!(
            rendered,
            "python melt.py /tmp/ws/0123456789abcdef --id 01234567"
        );
    }

    #[test]
    fn test_directives_absorb_takes_peak_np() {
        let mut merged = Directives {
            np: 2,
            walltime: Some("01:00:00".into()),
            ..Directives::default()
        };
        merged.absorb(&Directives {
            np: 8,
            walltime: Some("04:00:00".into()),
            memory: Some("4G".into()),
            submit_opts: vec!["--exclusive".into()],
            ..Directives::default()
        });
        assert_eq!(merged.np, 8);
        assert_eq!(merged.walltime.as_deref(), Some("01:00:00"));
        assert_eq!(merged.memory.as_deref(), Some("4G"));
        assert_eq!(merged.submit_opts, vec!["--exclusive".to_string()]);
    }
}
