//! Project and user configuration.
//!
//! A project is any directory with a `sluice.toml` at its root. Operations
//! and labels are declared as arrays of tables, which keeps their
//! declaration order; the operation graph depends on that order for
//! deterministic tie-breaking.

use crate::conditions::Condition;
use crate::constants::{dirs, files};
use crate::errors::ConfigError;
use crate::model::{Directives, LabelDef, OpName, OperationDef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Submit bundles to SLURM via `sbatch`/`squeue`.
    Slurm,
    /// Execute bundle scripts directly on this machine at submit time.
    #[default]
    Shell,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Slurm => write!(f, "slurm"),
            SchedulerKind::Shell => write!(f, "shell"),
        }
    }
}

impl FromStr for SchedulerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slurm" => Ok(SchedulerKind::Slurm),
            "shell" => Ok(SchedulerKind::Shell),
            _ => Err(ConfigError::UnknownScheduler(s.to_string())),
        }
    }
}

fn default_max_log_files() -> usize {
    10
}

fn default_max_log_age_days() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
    #[serde(default = "default_max_log_age_days")]
    pub max_age_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            max_files: default_max_log_files(),
            max_age_days: default_max_log_age_days(),
        }
    }
}

/// Machine-level preferences from the XDG config directory
/// (`~/.config/sluice/config.toml`). Everything here is a fallback; the
/// project file wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserConfig {
    pub scheduler: Option<SchedulerKind>,
    pub logging: Option<LoggingConfig>,
}

impl UserConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let base = xdg::BaseDirectories::with_prefix(dirs::SLUICE);
        let Some(path) = base.find_config_file("config.toml") else {
            return Ok(UserConfig::default());
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::PathIo { path, source })?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    project: RawProjectSection,
    #[serde(default)]
    submit: RawSubmitSection,
    #[serde(default)]
    graph: RawGraphSection,
    #[serde(default)]
    logging: Option<LoggingConfig>,
    #[serde(default, rename = "operation")]
    operations: Vec<RawOperation>,
    #[serde(default, rename = "label")]
    labels: Vec<RawLabel>,
}

#[derive(Debug, Deserialize)]
struct RawProjectSection {
    name: String,
    state_dir: Option<String>,
}

fn default_bundle_size() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct RawSubmitSection {
    scheduler: Option<String>,
    #[serde(default = "default_bundle_size")]
    bundle_size: usize,
    #[serde(default)]
    parallel_ops: bool,
}

// Derived `Default` would zero `bundle_size` when the whole `[submit]`
// section is missing; the field default must apply either way.
impl Default for RawSubmitSection {
    fn default() -> Self {
        RawSubmitSection {
            scheduler: None,
            bundle_size: default_bundle_size(),
            parallel_ops: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGraphSection {
    #[serde(default)]
    infer_dependencies: bool,
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    name: String,
    command: String,
    #[serde(default)]
    pre: Vec<Condition>,
    #[serde(default)]
    post: Vec<Condition>,
    #[serde(default)]
    after: Vec<String>,
    #[serde(default)]
    directives: Directives,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
    #[serde(default)]
    when: Vec<Condition>,
}

/// A fully resolved project: paths absolute, defaults applied, names
/// validated. Graph construction still happens separately so callers can
/// decide when to pay for it.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub name: String,
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub scheduler: SchedulerKind,
    pub bundle_size: usize,
    pub parallel_ops: bool,
    pub infer_dependencies: bool,
    pub logging: LoggingConfig,
    pub operations: Vec<OperationDef>,
    pub labels: Vec<LabelDef>,
}

impl ProjectConfig {
    pub fn load(root: &Path, user: &UserConfig) -> Result<Self, ConfigError> {
        let path = root.join(files::PROJECT_CONFIG);
        let content = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::ProjectNotFound(root.to_path_buf())
            } else {
                ConfigError::PathIo { path: path.clone(), source }
            }
        })?;
        let raw: RawConfig = toml::from_str(&content)?;

        let mut operations = Vec::with_capacity(raw.operations.len());
        for op in raw.operations {
            if !valid_op_name(&op.name) {
                return Err(ConfigError::InvalidOperationName { op: op.name });
            }
            let name = OpName(op.name);
            if op.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand { op: name });
            }
            operations.push(OperationDef {
                name,
                command: op.command,
                pre: op.pre,
                post: op.post,
                after: op.after.into_iter().map(OpName).collect(),
                directives: op.directives,
            });
        }

        let mut labels = Vec::with_capacity(raw.labels.len());
        for label in raw.labels {
            if labels.iter().any(|l: &LabelDef| l.name == label.name) {
                return Err(ConfigError::DuplicateLabel(label.name));
            }
            labels.push(LabelDef {
                name: label.name,
                when: label.when,
            });
        }

        let scheduler = match raw.submit.scheduler.as_deref() {
            Some(s) => SchedulerKind::from_str(s)?,
            None => user.scheduler.unwrap_or_default(),
        };

        let state_dir = match &raw.project.state_dir {
            Some(configured) => {
                let expanded = shellexpand::tilde(configured).into_owned();
                let expanded = PathBuf::from(expanded);
                if expanded.is_absolute() {
                    expanded
                } else {
                    root.join(expanded)
                }
            }
            None => root.join(dirs::STATE),
        };

        Ok(ProjectConfig {
            name: raw.project.name,
            root: root.to_path_buf(),
            state_dir,
            scheduler,
            bundle_size: raw.submit.bundle_size,
            parallel_ops: raw.submit.parallel_ops,
            infer_dependencies: raw.graph.infer_dependencies,
            logging: raw
                .logging
                .or_else(|| user.logging.clone())
                .unwrap_or_default(),
            operations,
            labels,
        })
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.root.join(dirs::WORKSPACE)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.state_dir.join(dirs::SCRIPTS)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join(dirs::LOGS)
    }
}

// Names end up in file names, record keys and scheduler labels, so the
// charset is deliberately narrow.
fn valid_op_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(['-', '.'])
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Walks from `start` upward until a directory containing `sluice.toml`
/// is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ConfigError> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };
    let mut dir = start.as_path();
    loop {
        if dir.join(files::PROJECT_CONFIG).is_file() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(ConfigError::ProjectNotFound(start)),
        }
    }
}
